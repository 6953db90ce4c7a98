//! Per-platform, per-account credential resolution.
//!
//! Credentials are loaded once at startup from a JSON document keyed by
//! platform, then by account name. An account with no entry of its own
//! falls back to the platform's `"default"` entry.

use std::collections::HashMap;

use serde::Deserialize;

use cadence_store::Platform;

use crate::PublishError;

/// Credentials for the Graph-style media API (page-scoped token).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCredentials {
    pub page_id: String,
    pub access_token: String,
}

/// Credentials for a plain text-post endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextCredentials {
    pub endpoint: String,
    pub access_token: String,
}

/// One platform/account credential entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformCredentials {
    Graph(GraphCredentials),
    Text(TextCredentials),
}

/// Immutable credential table, resolved per `(platform, account)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    entries: HashMap<Platform, HashMap<String, PlatformCredentials>>,
}

impl CredentialStore {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Look up credentials for an account, falling back to the
    /// platform's `"default"` entry.
    pub fn resolve(
        &self,
        platform: Platform,
        account: &str,
    ) -> Result<&PlatformCredentials, PublishError> {
        let by_account = self
            .entries
            .get(&platform)
            .ok_or_else(|| PublishError::CredentialsMissing {
                platform,
                account: account.to_string(),
            })?;

        by_account
            .get(account)
            .or_else(|| by_account.get("default"))
            .ok_or_else(|| PublishError::CredentialsMissing {
                platform,
                account: account.to_string(),
            })
    }
}
