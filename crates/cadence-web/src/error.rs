//! Error types for the HTTP layer.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use cadence_scheduler::SchedulerError;
use cadence_store::StoreError;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum WebError {
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Scheduler error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Store(StoreError::AlreadyPosted(_)) => StatusCode::CONFLICT,
            WebError::Store(StoreError::UnsupportedPlatform(_)) => StatusCode::BAD_REQUEST,
            WebError::Store(StoreError::QueueInvariantViolation { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            WebError::Scheduler(SchedulerError::Publish(_)) => StatusCode::BAD_GATEWAY,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
