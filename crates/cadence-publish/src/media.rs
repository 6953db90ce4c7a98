//! Graph-style media API client.
//!
//! Media goes out in three phases: create a container, poll its
//! processing status, then publish it. The phases live behind a trait so
//! the flow can be exercised against scripted publishers in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::credentials::GraphCredentials;
use crate::PublishError;

/// What kind of media container to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Reels,
    Stories,
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Reels => "REELS",
            MediaType::Stories => "STORIES",
            MediaType::Image => "IMAGE",
        }
    }
}

/// Processing state of a media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    /// Terminal failure, carrying the raw platform status code.
    Error(String),
}

/// The three publishing phases against a media platform.
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    /// Phase 1: create a container, returning its id.
    async fn create_container(
        &self,
        creds: &GraphCredentials,
        media_url: &str,
        caption: &str,
        media_type: MediaType,
    ) -> Result<String, PublishError>;

    /// Phase 2: read the container's processing status.
    async fn container_status(
        &self,
        creds: &GraphCredentials,
        container_id: &str,
    ) -> Result<ContainerStatus, PublishError>;

    /// Phase 3: publish a finished container, returning the media id.
    async fn publish_container(
        &self,
        creds: &GraphCredentials,
        container_id: &str,
    ) -> Result<String, PublishError>;
}

/// HTTP client for the Graph media API.
pub struct GraphMediaClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: String,
}

impl GraphMediaClient {
    /// Create a client rooted at the given API base URL (no trailing
    /// slash), e.g. `https://graph.facebook.com/v23.0`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PublishError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl MediaPublisher for GraphMediaClient {
    async fn create_container(
        &self,
        creds: &GraphCredentials,
        media_url: &str,
        caption: &str,
        media_type: MediaType,
    ) -> Result<String, PublishError> {
        let url = format!("{}/{}/media", self.base_url, creds.page_id);
        // Images use a different source parameter and no media_type.
        let mut form = vec![
            ("caption", caption.to_string()),
            ("access_token", creds.access_token.clone()),
        ];
        match media_type {
            MediaType::Image => form.push(("image_url", media_url.to_string())),
            _ => {
                form.push(("video_url", media_url.to_string()));
                form.push(("media_type", media_type.as_str().to_string()));
            }
        }

        let response = self.http.post(&url).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::CreateFailed(format!("{status}: {text}")));
        }

        let body: IdResponse = response.json().await?;
        debug!(container_id = %body.id, media_type = media_type.as_str(), "container created");
        Ok(body.id)
    }

    async fn container_status(
        &self,
        creds: &GraphCredentials,
        container_id: &str,
    ) -> Result<ContainerStatus, PublishError> {
        let url = format!("{}/{}", self.base_url, container_id);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", "status_code"),
                ("access_token", creds.access_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: StatusResponse = response.json().await?;
        Ok(match body.status_code.as_str() {
            "IN_PROGRESS" => ContainerStatus::InProgress,
            "FINISHED" => ContainerStatus::Finished,
            other => ContainerStatus::Error(other.to_string()),
        })
    }

    async fn publish_container(
        &self,
        creds: &GraphCredentials,
        container_id: &str,
    ) -> Result<String, PublishError> {
        let url = format!("{}/{}/media_publish", self.base_url, creds.page_id);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("creation_id", container_id),
                ("access_token", creds.access_token.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: IdResponse = response.json().await?;
        Ok(body.id)
    }
}
