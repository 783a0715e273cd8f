//! Synchronized document state and its caller-facing snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syncline_core::types::id::DocumentId;

use crate::conflict::{Conflict, ConflictView};

/// Save status derived from the document state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// A send is in flight.
    Saving,
    /// Local content diverges from the last confirmed authority content.
    Unsaved,
    /// Local content matches the last confirmed authority content.
    Saved,
}

/// One editable document under synchronization.
///
/// Invariant: `dirty == (local_content != last_known_authority_content)`.
#[derive(Debug)]
pub(crate) struct DocumentState {
    pub document_id: DocumentId,
    pub local_content: String,
    /// Last content value confirmed accepted by the authority.
    pub last_known_authority_content: String,
    pub dirty: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending_conflicts: Vec<Conflict>,
    /// Last send failure surfaced to the caller, cleared on edit/success.
    pub last_error: Option<String>,
    /// Whether a send is currently in flight.
    pub saving: bool,
    /// Incremented on every conflict creation; in-flight sends capture it
    /// so a late acknowledgment cannot clobber a conflict raised meanwhile.
    pub conflict_epoch: u64,
}

impl DocumentState {
    pub fn new(document_id: DocumentId, initial_content: String) -> Self {
        Self {
            document_id,
            local_content: initial_content.clone(),
            last_known_authority_content: initial_content,
            dirty: false,
            last_synced_at: None,
            pending_conflicts: Vec::new(),
            last_error: None,
            saving: false,
            conflict_epoch: 0,
        }
    }

    /// Re-establish the dirty invariant after a content mutation.
    pub fn recompute_dirty(&mut self) {
        self.dirty = self.local_content != self.last_known_authority_content;
    }

    pub fn unresolved_conflicts(&self) -> usize {
        self.pending_conflicts
            .iter()
            .filter(|c| !c.resolved)
            .count()
    }

    pub fn save_status(&self) -> SaveStatus {
        if self.saving {
            SaveStatus::Saving
        } else if self.dirty {
            SaveStatus::Unsaved
        } else {
            SaveStatus::Saved
        }
    }

    /// Whether new edits should be accepted. False while a send is in
    /// flight or while unresolved conflicts exist, so new edits cannot
    /// compound an already-ambiguous state.
    pub fn can_edit(&self) -> bool {
        !self.saving && self.unresolved_conflicts() == 0
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            document_id: self.document_id,
            content: self.local_content.clone(),
            save_status: self.save_status(),
            last_saved: self.last_synced_at,
            has_unsaved_changes: self.dirty,
            can_edit: self.can_edit(),
            conflicts: self.pending_conflicts.iter().map(ConflictView::from).collect(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only snapshot of the document state exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSnapshot {
    /// Document under synchronization.
    pub document_id: DocumentId,
    /// Current local content.
    pub content: String,
    /// Derived save status.
    pub save_status: SaveStatus,
    /// When the authority last confirmed a save.
    pub last_saved: Option<DateTime<Utc>>,
    /// Whether local content diverges from the authority.
    pub has_unsaved_changes: bool,
    /// Whether new edits should be accepted.
    pub can_edit: bool,
    /// Pending conflicts, oldest first.
    pub conflicts: Vec<ConflictView>,
    /// Last send failure, if any.
    pub last_error: Option<String>,
}
