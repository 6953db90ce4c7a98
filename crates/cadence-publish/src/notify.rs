//! Failure notification sink.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::warn;

/// Fire-and-forget notification on unrecoverable publish failures.
/// Delivery problems are logged, never surfaced to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str);
}

/// Notifier that drops everything.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _subject: &str, _body: &str) {}
}

/// Posts notifications as JSON to a webhook URL.
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

#[derive(Serialize)]
struct Notification<'a> {
    subject: &'a str,
    body: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        let result = self
            .http
            .post(&self.url)
            .json(&Notification { subject, body })
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(error) = result {
            warn!(error = %error, subject, "failed to deliver notification");
        }
    }
}
