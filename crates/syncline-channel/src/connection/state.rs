//! Channel connection state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Liveness state of the channel.
///
/// Transitions: `Disconnected → Connecting → Connected → Disconnected`
/// (on error or explicit disconnect) `→ Connecting` (automatic
/// reconnection). Exhausting the reconnect budget moves the channel to
/// the terminal `Unreachable` state; only an explicit `connect` leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No channel is open.
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The channel is open and authenticated.
    Connected,
    /// The reconnect budget was exhausted; the authority cannot be reached.
    Unreachable,
}

impl ConnectionState {
    /// Whether the channel is currently usable.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// String form used in logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
