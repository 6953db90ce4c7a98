//! Content data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A platform we can publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Bluesky,
    Threads,
}

impl Platform {
    /// All known platforms.
    pub const ALL: [Platform; 4] = [
        Platform::Instagram,
        Platform::Twitter,
        Platform::Bluesky,
        Platform::Threads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Bluesky => "bluesky",
            Platform::Threads => "threads",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "twitter" => Ok(Platform::Twitter),
            "bluesky" => Ok(Platform::Bluesky),
            "threads" => Ok(Platform::Threads),
            other => Err(StoreError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Platform-specific content. Opaque to the scheduling core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostPayload {
    /// A video reel with caption and hashtags.
    Reel {
        video_url: String,
        caption: String,
        #[serde(default)]
        hashtags: Vec<String>,
    },
    /// A plain text post (tweet, skeet, thread).
    Text { text: String },
    /// Generic single-media post.
    Media {
        url: String,
        #[serde(default)]
        caption: String,
    },
}

/// One piece of pending content plus its scheduling metadata.
///
/// `queue_position` is a dense 1-based rank among the account's
/// selected-and-unposted items; it determines publish order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    /// Opaque unique identifier, stable across re-saves.
    pub id: String,
    /// Which credential/collection set owns this item.
    pub account: String,
    /// Platform-specific content.
    pub payload: PostPayload,
    /// Monotonic false -> true; never reset once true.
    pub is_posted: bool,
    /// True means the item is enqueued for scheduled posting.
    pub is_selected: bool,
    /// Dense 1-based queue rank; None when not queued.
    pub queue_position: Option<u32>,
    /// Computed fire time; None when not queued.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Set exactly once, when posting succeeds.
    pub posted_at: Option<DateTime<Utc>>,
    /// Free-form posting category (feed, buildinpublic, ...).
    pub post_type: Option<String>,
}

impl ScheduledItem {
    /// True when this item counts toward the account's live queue.
    pub fn is_queued(&self) -> bool {
        self.is_selected && !self.is_posted
    }
}

/// Raw content as received by bulk ingest. Missing fields get defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestItem {
    /// Optional caller-supplied id; generated when absent.
    pub id: Option<String>,
    pub payload: PostPayload,
    /// Defaults to false.
    #[serde(default)]
    pub is_posted: bool,
}

/// Render a duration as a short human-readable delay, e.g. "3h 24m".
pub fn human_duration(d: Duration) -> String {
    let total_minutes = d.num_minutes().max(0);
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}
