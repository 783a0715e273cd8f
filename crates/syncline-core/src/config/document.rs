//! Document synchronization configuration.

use serde::{Deserialize, Serialize};

/// Default policy applied when a remote update conflicts with local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Discard local edits and adopt the authority's content.
    Server,
    /// Keep local edits; the next send overwrites the authority's content.
    Client,
    /// Three-way textual merge against the last confirmed authority content.
    Merge,
    /// Record the conflict unresolved and block edits until the caller
    /// resolves it explicitly.
    Manual,
}

/// Document synchronization engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Debounce interval for auto-save in milliseconds.
    #[serde(default = "default_auto_save_delay")]
    pub auto_save_delay_ms: u64,
    /// Default conflict-resolution policy.
    #[serde(default = "default_conflict_policy")]
    pub conflict_policy: ConflictPolicy,
    /// Base URL of the HTTP authority API, used for the initial document
    /// fetch and as a non-real-time save fallback when the channel is down.
    #[serde(default)]
    pub fallback_base_url: Option<String>,
    /// Timeout for HTTP fallback requests in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            auto_save_delay_ms: default_auto_save_delay(),
            conflict_policy: default_conflict_policy(),
            fallback_base_url: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_auto_save_delay() -> u64 {
    2000
}

fn default_conflict_policy() -> ConflictPolicy {
    ConflictPolicy::Merge
}

fn default_request_timeout() -> u64 {
    5000
}
