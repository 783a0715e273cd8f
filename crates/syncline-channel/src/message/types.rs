//! Outbound and inbound channel message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syncline_core::types::id::{DocumentId, RequestId, SessionId};

use crate::room::RoomKind;

/// Messages sent by the client to the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate the channel with an identity token.
    Authenticate {
        /// Opaque identity token from the session provider.
        token: String,
    },
    /// Liveness ping.
    Ping {
        /// Client timestamp (milliseconds since epoch).
        timestamp: i64,
    },
    /// Join a topic-scoped room.
    JoinRoom {
        /// Room kind.
        kind: RoomKind,
        /// Room identifier within the kind.
        id: String,
    },
    /// Leave a topic-scoped room.
    LeaveRoom {
        /// Room kind.
        kind: RoomKind,
        /// Room identifier within the kind.
        id: String,
    },
    /// Propagate a local document update to the authority.
    DocumentUpdate {
        /// Correlation ID echoed back in the acknowledgment.
        request_id: RequestId,
        /// The update payload.
        payload: DocumentUpdatePayload,
    },
}

/// Messages sent by the authority to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    Welcome {
        /// Session assigned by the authority.
        session_id: SessionId,
    },
    /// Pong response to a client ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
    /// Acknowledgment of an acknowledged request.
    Ack {
        /// Correlation ID of the request being acknowledged.
        request_id: RequestId,
        /// Whether the request was accepted.
        ok: bool,
        /// Rejection reason when `ok` is false.
        error: Option<String>,
    },
    /// A document changed on the authority.
    DocumentUpdated {
        /// Document that changed.
        document_id: DocumentId,
        /// Full authoritative content.
        content: String,
        /// When the authority applied the change.
        updated_at: DateTime<Utc>,
    },
    /// Room membership confirmed.
    RoomJoined {
        /// Room kind.
        kind: RoomKind,
        /// Room identifier within the kind.
        id: String,
    },
    /// Error reported by the authority.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

/// Document update payload.
///
/// This shape is part of the authority API contract and is serialized
/// in camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdatePayload {
    /// Document being updated.
    pub document_id: DocumentId,
    /// Full document content.
    pub content: String,
    /// Client timestamp of the update.
    pub timestamp: DateTime<Utc>,
    /// Word count of the content.
    pub word_count: usize,
}
