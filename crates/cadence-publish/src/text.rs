//! Plain text-post publishing.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::credentials::TextCredentials;
use crate::PublishError;

/// Posts plain text to a platform endpoint.
#[async_trait]
pub trait TextPublisher: Send + Sync {
    async fn post_text(&self, creds: &TextCredentials, text: &str) -> Result<(), PublishError>;
}

/// Text publisher that posts JSON to the credential's endpoint with a
/// bearer token.
pub struct HttpTextPublisher {
    http: Client,
}

#[derive(Serialize)]
struct TextPost<'a> {
    text: &'a str,
}

impl HttpTextPublisher {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for HttpTextPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextPublisher for HttpTextPublisher {
    async fn post_text(&self, creds: &TextCredentials, text: &str) -> Result<(), PublishError> {
        self.http
            .post(&creds.endpoint)
            .bearer_auth(&creds.access_token)
            .json(&TextPost { text })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
