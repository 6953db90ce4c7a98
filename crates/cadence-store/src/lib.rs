//! Item store and posting queue for Cadence.
//!
//! This crate owns the content data model and the per-account posting
//! queue:
//! - `ScheduledItem`: one piece of pending content plus its queue metadata
//! - `ItemStore`: per-account partitioned store with accept/reject/deselect
//!   semantics and dense queue positions
//!
//! Scheduling policy lives elsewhere; queue operations that need a fire
//! time take it as a caller-supplied derivation function.

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::{AcceptReceipt, ItemStore, ListFilter};
pub use types::{IngestItem, Platform, PostPayload, ScheduledItem, human_duration};
