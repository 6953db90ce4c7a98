//! The publish action wired into scheduler chains.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use cadence_scheduler::{PublishAction, PublishOutcome, SchedulerKey};
use cadence_store::{ItemStore, PostPayload, ScheduledItem};

use crate::caption::CaptionRules;
use crate::credentials::{CredentialStore, GraphCredentials, PlatformCredentials};
use crate::flow::MediaPublishFlow;
use crate::media::{MediaPublisher, MediaType};
use crate::notify::Notifier;
use crate::text::TextPublisher;
use crate::PublishError;

/// Publishes the next due queue item for a key.
///
/// On each chain fire: poll the account's queue for the lowest-position
/// due item, resolve credentials, run the platform-appropriate publish,
/// then mark the item posted. A failed publish leaves the item unposted
/// and queued; the notifier hears about it and the chain moves on.
pub struct QueuePublisher {
    store: ItemStore,
    credentials: Arc<CredentialStore>,
    captions: Arc<CaptionRules>,
    media: Arc<dyn MediaPublisher>,
    text: Arc<dyn TextPublisher>,
    flow: MediaPublishFlow,
    notifier: Arc<dyn Notifier>,
}

impl QueuePublisher {
    pub fn new(
        store: ItemStore,
        credentials: Arc<CredentialStore>,
        captions: Arc<CaptionRules>,
        media: Arc<dyn MediaPublisher>,
        text: Arc<dyn TextPublisher>,
        flow: MediaPublishFlow,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            credentials,
            captions,
            media,
            text,
            flow,
            notifier,
        }
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn try_publish_next(
        &self,
        key: &SchedulerKey,
    ) -> Result<PublishOutcome, PublishError> {
        let now = Utc::now();
        let Some(item) = self.store.poll_due(&key.account, now).await else {
            return Ok(PublishOutcome::NothingDue);
        };

        let creds = self.credentials.resolve(key.platform, &key.account)?;
        self.publish_item(key, &item, creds).await?;

        self.store.mark_posted(&key.account, &item.id, now).await?;
        info!(key = %key, item_id = %item.id, "item published");
        Ok(PublishOutcome::Published { item_id: item.id })
    }

    async fn publish_item(
        &self,
        key: &SchedulerKey,
        item: &ScheduledItem,
        creds: &PlatformCredentials,
    ) -> Result<(), PublishError> {
        match (&item.payload, creds) {
            (
                PostPayload::Reel {
                    video_url,
                    caption,
                    hashtags,
                },
                PlatformCredentials::Graph(graph),
            ) => {
                self.publish_story(key, graph, video_url).await;

                let mut caption = self.captions.customize(key.platform, &key.account, caption);
                if !hashtags.is_empty() {
                    caption.push_str("\n\n");
                    caption.push_str(&hashtags.join(" "));
                }
                self.flow
                    .run(self.media.as_ref(), graph, video_url, &caption, MediaType::Reels)
                    .await?;
                Ok(())
            }
            (PostPayload::Media { url, caption }, PlatformCredentials::Graph(graph)) => {
                let caption = self.captions.customize(key.platform, &key.account, caption);
                self.flow
                    .run(self.media.as_ref(), graph, url, &caption, MediaType::Image)
                    .await?;
                Ok(())
            }
            (PostPayload::Text { text }, PlatformCredentials::Text(text_creds)) => {
                let text = self.captions.customize(key.platform, &key.account, text);
                self.text.post_text(text_creds, &text).await
            }
            // Payload kind and credential kind disagree; treat as
            // unconfigured rather than attempting the wrong API.
            _ => Err(PublishError::CredentialsMissing {
                platform: key.platform,
                account: key.account.clone(),
            }),
        }
    }

    /// A reel also goes out as a story. Story failures never block the
    /// reel itself.
    async fn publish_story(&self, key: &SchedulerKey, graph: &GraphCredentials, video_url: &str) {
        if let Err(error) = self
            .flow
            .run(self.media.as_ref(), graph, video_url, "", MediaType::Stories)
            .await
        {
            warn!(key = %key, error = %error, "story publish failed; continuing with reel");
        }
    }
}

#[async_trait]
impl PublishAction for QueuePublisher {
    async fn publish_next(&self, key: &SchedulerKey) -> Result<PublishOutcome, String> {
        match self.try_publish_next(key).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.notifier
                    .notify(&format!("publish failed for {key}"), &error.to_string())
                    .await;
                Err(error.to_string())
            }
        }
    }
}
