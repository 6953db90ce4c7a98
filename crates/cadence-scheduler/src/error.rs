//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A manually triggered publish action failed.
    #[error("publish action failed: {0}")]
    Publish(String),
}
