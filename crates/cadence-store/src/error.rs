//! Error types for the item store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Item or account not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Item has already been posted and can no longer be queued.
    #[error("item already posted: {0}")]
    AlreadyPosted(String),

    /// Unknown platform discriminator.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Defensive check tripped: queue positions are duplicated or gapped.
    /// Mutations that would corrupt the queue are rolled back.
    #[error("queue invariant violation for account {account}: {detail}")]
    QueueInvariantViolation { account: String, detail: String },
}
