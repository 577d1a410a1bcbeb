use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct AwsMessage {
    #[serde(rename = "$value")]
    pub message: String,
}

/// Error body returned by the json protocol services such as ECS.
#[derive(Deserialize, Debug)]
pub struct AwsJsonError {
    #[serde(rename = "__type")]
    pub kind: Option<String>,
    #[serde(alias = "Message")]
    pub message: Option<String>,
}
