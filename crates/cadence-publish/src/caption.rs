//! Per-account caption customization.

use std::collections::HashMap;

use serde::Deserialize;

use cadence_store::Platform;

/// How one account's captions are rewritten before publishing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionRule {
    /// Appended after the original caption, separated by a blank line.
    pub suffix: Option<String>,
    /// Replaces the original caption entirely. Applied before `suffix`.
    pub replace: Option<String>,
}

/// Caption rewrite table keyed by platform, then account. Accounts with
/// no entry fall back to the platform's `"default"` entry; with neither,
/// captions pass through unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CaptionRules {
    rules: HashMap<Platform, HashMap<String, CaptionRule>>,
}

impl CaptionRules {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn customize(&self, platform: Platform, account: &str, caption: &str) -> String {
        let Some(rule) = self.rules.get(&platform).and_then(|by_account| {
            by_account.get(account).or_else(|| by_account.get("default"))
        }) else {
            return caption.to_string();
        };

        let base = rule.replace.as_deref().unwrap_or(caption);
        match &rule.suffix {
            Some(suffix) => format!("{base}\n\n{suffix}"),
            None => base.to_string(),
        }
    }
}
