//! Conflict records and the textual merge fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syncline_core::types::id::ConflictId;

/// Separator inserted between local and remote text when both sides
/// changed. Part of the merge output contract.
pub const MERGE_SEPARATOR: &str = "\n\n[MERGED CONTENT]\n";

/// How a conflict was (or is to be) resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Not yet resolved.
    Unresolved,
    /// The authority's content won.
    Server,
    /// The local content won.
    Client,
    /// Both sides were merged textually.
    Merge,
}

/// A detected divergence between local edits and an authority update.
///
/// Created when a remote update arrives while the document is dirty and
/// the incoming content differs from the last confirmed authority
/// content. Resolved exactly once, either by the configured default
/// policy or by an explicit caller action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique conflict ID.
    pub id: ConflictId,
    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
    /// Local content at detection time.
    pub local_content: String,
    /// Remote content that triggered the conflict.
    pub remote_content: String,
    /// Whether the conflict has been resolved.
    pub resolved: bool,
    /// The applied resolution.
    pub resolution: ConflictResolution,
}

impl Conflict {
    /// Record a new, unresolved conflict.
    pub fn new(local_content: impl Into<String>, remote_content: impl Into<String>) -> Self {
        Self {
            id: ConflictId::new(),
            detected_at: Utc::now(),
            local_content: local_content.into(),
            remote_content: remote_content.into(),
            resolved: false,
            resolution: ConflictResolution::Unresolved,
        }
    }

    /// Mark the conflict resolved.
    pub fn resolve(&mut self, resolution: ConflictResolution) {
        self.resolved = true;
        self.resolution = resolution;
    }
}

/// Conflict view surfaced to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictView {
    /// Conflict ID.
    pub id: ConflictId,
    /// Detection timestamp.
    pub timestamp: DateTime<Utc>,
    /// Local content snapshot.
    pub local_content: String,
    /// Remote content snapshot.
    pub remote_content: String,
    /// Whether the conflict has been resolved.
    pub resolved: bool,
}

impl From<&Conflict> for ConflictView {
    fn from(conflict: &Conflict) -> Self {
        Self {
            id: conflict.id,
            timestamp: conflict.detected_at,
            local_content: conflict.local_content.clone(),
            remote_content: conflict.remote_content.clone(),
            resolved: conflict.resolved,
        }
    }
}

/// Three-way textual merge with `ancestor` as the common base.
///
/// If only one side changed, the other side is taken verbatim. If both
/// changed, local and remote are concatenated around a marked separator:
/// lossless, but the cleanup is manual. This is a deliberate fallback,
/// not a structural merge.
pub fn three_way_merge(ancestor: &str, local: &str, remote: &str) -> String {
    if local == ancestor {
        remote.to_string()
    } else if remote == ancestor {
        local.to_string()
    } else {
        format!("{local}{MERGE_SEPARATOR}{remote}")
    }
}
