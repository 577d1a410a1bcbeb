use std::error::Error as StandardError;
use std::sync::Arc;

use anyhow::{anyhow, Context, Error};
use chrono::DateTime;
use rusoto_core::region::Region;
use rusoto_core::request::BufferedHttpResponse;
use rusoto_core::RusotoError;
use rusoto_credential::{DefaultCredentialsProvider, StaticProvider};
use rusoto_sts::{AssumeRoleRequest, AssumeRoleResponse, Sts, StsClient};

use crate::aws::client::HttpClient;
use crate::aws::dto::{AwsJsonError, AwsMessage};

const SESSION_NAME: &str = "morgan";

#[derive(Debug)]
pub struct Credentials {
    pub aws_access_key: String,
    pub aws_secret_key: String,
    pub aws_sts_token: String,
}

impl Credentials {
    pub fn into_provider(self) -> StaticProvider {
        StaticProvider::new(
            self.aws_access_key,
            self.aws_secret_key,
            Some(self.aws_sts_token),
            None,
        )
    }
}

pub async fn assume_role(
    client: Arc<HttpClient>,
    region: Region,
    role_arn: &str,
) -> Result<Credentials, Error> {
    debug!("Assuming role {} in {:?}", role_arn, region);
    let provider = DefaultCredentialsProvider::new()
        .with_context(|| "Failed to build the default aws credentials chain")?;
    let sts_client = StsClient::new_with(client, provider, region);

    let response = sts_client
        .assume_role(build_assume_role_request(role_arn))
        .await
        .map_err(match_rusoto_errors)
        .with_context(|| format!("Failed to assume role {}", role_arn))?;

    let credentials = extract_credentials(response)?;
    match DateTime::parse_from_rfc3339(&credentials.expiration) {
        Ok(expiration) => info!("Assumed role {}, session valid until {}", role_arn, expiration),
        Err(_) => info!("Assumed role {}", role_arn),
    }

    Ok(Credentials {
        aws_access_key: credentials.access_key_id,
        aws_secret_key: credentials.secret_access_key,
        aws_sts_token: credentials.session_token,
    })
}

fn extract_credentials(assume_role_res: AssumeRoleResponse) -> Result<rusoto_sts::Credentials, Error> {
    assume_role_res
        .clone()
        .credentials
        .ok_or_else(|| {
            anyhow!(format!(
                "Could not create an assume role from the response `{:?}`",
                assume_role_res
            ))
        })
        .with_context(|| "Missing credentials from assume role")
}

fn build_assume_role_request(role_arn: &str) -> AssumeRoleRequest {
    AssumeRoleRequest {
        role_arn: role_arn.to_owned(),
        role_session_name: SESSION_NAME.to_owned(),
        ..Default::default()
    }
}

/// Flattens any rusoto failure into a readable error.
pub fn match_rusoto_errors<E: StandardError + Send + Sync + 'static>(err: RusotoError<E>) -> Error {
    match err {
        RusotoError::Service(err) => anyhow!(format!("{}", err)),
        RusotoError::HttpDispatch(err) => anyhow!(format!("{}", err)),
        RusotoError::Credentials(err) => anyhow!(format!("{}", err)),
        RusotoError::Validation(err) => anyhow!(err),
        RusotoError::ParseError(err) => anyhow!(err),
        RusotoError::Unknown(err) => parse_aws_body(err),
        RusotoError::Blocking => anyhow!("There was a blocking issue calling aws"),
    }
}

fn parse_aws_body(err: BufferedHttpResponse) -> Error {
    let doc_str = String::from_utf8_lossy(&err.body).into_owned();
    match parse_aws_message(&doc_str) {
        Some(message) => anyhow!(message),
        None => anyhow!(format!("Aws returned status {} body: {}", err.status, doc_str)),
    }
}

/// Pulls the message out of an xml (query protocol) or json error body.
fn parse_aws_message(doc_str: &str) -> Option<String> {
    if let Some(idl_ix) = doc_str.find("<Message>") {
        let end_ix = doc_str[idl_ix..]
            .find("</Message>")
            .map(|ix| idl_ix + ix + "</Message>".len())
            .unwrap_or_else(|| doc_str.len());
        let aws_message: Result<AwsMessage, serde_xml_rs::Error> =
            serde_xml_rs::from_str(&doc_str[idl_ix..end_ix]);
        return match aws_message {
            Ok(value) => Some(value.message),
            Err(_) => Some(format!("Failed to read xml from document: {}", doc_str)),
        };
    }
    match serde_json::from_str::<AwsJsonError>(doc_str) {
        Ok(AwsJsonError {
            message: Some(message),
            kind: Some(kind),
        }) => Some(format!("{}: {}", kind, message)),
        Ok(AwsJsonError {
            message: Some(message),
            kind: None,
        }) => Some(message),
        _ => None,
    }
}
