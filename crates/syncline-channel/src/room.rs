//! Topic-scoped room identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of topic a room scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// Events for a single document.
    Document,
    /// Events for a whole workspace.
    Workspace,
}

impl RoomKind {
    /// String form used in room names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Workspace => "workspace",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A joined room: a kind plus an identifier within that kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Room {
    /// Room kind.
    pub kind: RoomKind,
    /// Room identifier.
    pub id: String,
}

impl Room {
    /// Create a new room reference.
    pub fn new(kind: RoomKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Canonical room name, e.g. `document:42`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}
