//! HTTP control plane for Cadence.
//!
//! Thin JSON layer over the item store and the scheduler registry:
//! start/stop/status/manual-post per `(platform, account)` key, plus
//! ingest/list/accept/reject/deselect for the posting queue.

mod error;
mod routes;

pub use error::WebError;
pub use routes::{AppState, create_router};
