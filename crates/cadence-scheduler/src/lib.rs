//! Scheduling core for Cadence.
//!
//! This crate provides:
//! - The time-windowed, randomized next-post-time algorithm
//! - Self-perpetuating per-key job chains with cancel/replace semantics
//! - The keyed control-plane registry (start/stop/status/manual trigger)
//!
//! Publishing itself is a capability: callers hand the registry a
//! [`PublishAction`] and the chains drive it.

mod error;
mod policy;
mod registry;
mod types;

pub use error::SchedulerError;
pub use policy::{DaytimeWindow, SchedulingPolicy, clamp_to_daytime, next_fire_time};
pub use registry::{PublishAction, SchedulerRegistry};
pub use types::{PublishOutcome, RunState, SchedulerKey, StartReport, StatusReport, StopReport};
