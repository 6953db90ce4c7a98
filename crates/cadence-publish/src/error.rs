//! Error types for the publishing pipeline.

use thiserror::Error;

use cadence_store::{Platform, StoreError};

/// Errors that can occur while publishing an item.
#[derive(Debug, Error)]
pub enum PublishError {
    /// No credentials configured for the platform/account pair.
    #[error("no credentials for {platform}/{account}")]
    CredentialsMissing { platform: Platform, account: String },

    /// The platform refused to create the media container.
    #[error("media container creation failed: {0}")]
    CreateFailed(String),

    /// Container processing did not finish within the poll budget.
    #[error("media container still processing after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The platform reported a terminal failure for the container.
    #[error("platform rejected the media container: {status}")]
    Rejected { status: String },

    /// Transport-level failure talking to the platform.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Queue state error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
