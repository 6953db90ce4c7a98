//! The bounded three-phase media publish flow.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::credentials::GraphCredentials;
use crate::media::{ContainerStatus, MediaPublisher, MediaType};
use crate::PublishError;

/// Drives create -> poll -> publish with a hard poll budget.
///
/// The original pipeline polled container status forever; a stuck
/// container would pin its chain link indefinitely. Polling is bounded
/// here: after `max_poll_attempts` checks the attempt fails with
/// [`PublishError::Timeout`] and the item stays unposted.
#[derive(Debug, Clone)]
pub struct MediaPublishFlow {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl Default for MediaPublishFlow {
    fn default() -> Self {
        Self {
            // 30 checks at one minute apart: give up after half an hour.
            poll_interval: Duration::from_secs(60),
            max_poll_attempts: 30,
        }
    }
}

impl MediaPublishFlow {
    /// Run all three phases, returning the published media id.
    #[tracing::instrument(skip(self, publisher, creds, caption), fields(media_type = media_type.as_str()))]
    pub async fn run(
        &self,
        publisher: &dyn MediaPublisher,
        creds: &GraphCredentials,
        media_url: &str,
        caption: &str,
        media_type: MediaType,
    ) -> Result<String, PublishError> {
        let container_id = publisher
            .create_container(creds, media_url, caption, media_type)
            .await?;

        let mut attempts = 0;
        loop {
            match publisher.container_status(creds, &container_id).await? {
                ContainerStatus::Finished => break,
                ContainerStatus::Error(status) => {
                    warn!(container_id = %container_id, status = %status, "container rejected");
                    return Err(PublishError::Rejected { status });
                }
                ContainerStatus::InProgress => {
                    attempts += 1;
                    if attempts >= self.max_poll_attempts {
                        return Err(PublishError::Timeout { attempts });
                    }
                    debug!(container_id = %container_id, attempts, "container still processing");
                    sleep(self.poll_interval).await;
                }
            }
        }

        publisher.publish_container(creds, &container_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Publisher that replays a scripted sequence of status answers.
    struct ScriptedPublisher {
        statuses: Mutex<VecDeque<ContainerStatus>>,
        status_calls: AtomicU32,
    }

    impl ScriptedPublisher {
        fn new(statuses: impl IntoIterator<Item = ContainerStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                status_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaPublisher for ScriptedPublisher {
        async fn create_container(
            &self,
            _creds: &GraphCredentials,
            _media_url: &str,
            _caption: &str,
            _media_type: MediaType,
        ) -> Result<String, PublishError> {
            Ok("container-1".to_string())
        }

        async fn container_status(
            &self,
            _creds: &GraphCredentials,
            _container_id: &str,
        ) -> Result<ContainerStatus, PublishError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            // A drained script keeps answering in-progress.
            Ok(statuses.pop_front().unwrap_or(ContainerStatus::InProgress))
        }

        async fn publish_container(
            &self,
            _creds: &GraphCredentials,
            _container_id: &str,
        ) -> Result<String, PublishError> {
            Ok("media-9".to_string())
        }
    }

    fn creds() -> GraphCredentials {
        GraphCredentials {
            page_id: "1789".to_string(),
            access_token: "tok".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn finishes_after_processing() {
        let publisher = ScriptedPublisher::new([
            ContainerStatus::InProgress,
            ContainerStatus::InProgress,
            ContainerStatus::Finished,
        ]);
        let flow = MediaPublishFlow::default();

        let media_id = flow
            .run(&publisher, &creds(), "https://cdn.example/v.mp4", "hi", MediaType::Reels)
            .await
            .unwrap();
        assert_eq!(media_id, "media-9");
        assert_eq!(publisher.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_poll_budget() {
        let publisher = ScriptedPublisher::new([]);
        let flow = MediaPublishFlow::default();

        let err = flow
            .run(&publisher, &creds(), "https://cdn.example/v.mp4", "hi", MediaType::Reels)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Timeout { attempts: 30 }));
        assert_eq!(publisher.status_calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_container_fails_the_attempt() {
        let publisher = ScriptedPublisher::new([
            ContainerStatus::InProgress,
            ContainerStatus::Error("ERROR".to_string()),
        ]);
        let flow = MediaPublishFlow::default();

        let err = flow
            .run(&publisher, &creds(), "https://cdn.example/v.mp4", "hi", MediaType::Reels)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected { status } if status == "ERROR"));
    }
}
