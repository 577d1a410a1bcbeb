use anyhow::{Context, Error};
pub use rusoto_core::request::HttpClient;

pub fn new_client() -> Result<HttpClient, Error> {
    HttpClient::new().with_context(|| "Failed to create the aws http client")
}
