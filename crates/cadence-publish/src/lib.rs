//! Platform publishing for Cadence.
//!
//! Turns a due queue item into a live post:
//! - Credential resolution per `(platform, account)`
//! - Caption customization
//! - The three-phase media flow (create container, poll, publish) with a
//!   bounded poll budget
//! - Plain text posting
//! - A failure notification sink
//!
//! The entry point is [`QueuePublisher`], which implements the
//! scheduler's `PublishAction` trait.

mod action;
mod caption;
mod credentials;
mod error;
mod flow;
mod media;
mod notify;
mod text;

pub use action::QueuePublisher;
pub use caption::{CaptionRule, CaptionRules};
pub use credentials::{CredentialStore, GraphCredentials, PlatformCredentials, TextCredentials};
pub use error::PublishError;
pub use flow::MediaPublishFlow;
pub use media::{ContainerStatus, GraphMediaClient, MediaPublisher, MediaType};
pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
pub use text::{HttpTextPublisher, TextPublisher};
