//! Channel (WebSocket) configuration.

use serde::{Deserialize, Serialize};

/// Channel connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the authority (e.g. `wss://sync.example.com/ws`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Delay between automatic reconnect attempts in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Maximum consecutive automatic reconnect attempts before the
    /// authority is reported unreachable.
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect_attempts: u32,
    /// Liveness ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Handshake timeout in milliseconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
    /// Timeout waiting for an update acknowledgment in milliseconds.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_ms: u64,
    /// Outbound message buffer size.
    #[serde(default = "default_send_buffer")]
    pub send_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: default_max_reconnect(),
            ping_interval_seconds: default_ping_interval(),
            handshake_timeout_ms: default_handshake_timeout(),
            ack_timeout_ms: default_ack_timeout(),
            send_buffer_size: default_send_buffer(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://localhost:4000/ws".to_string()
}

fn default_reconnect_delay() -> u64 {
    3000
}

fn default_max_reconnect() -> u32 {
    5
}

fn default_ping_interval() -> u64 {
    30
}

fn default_handshake_timeout() -> u64 {
    5000
}

fn default_ack_timeout() -> u64 {
    10_000
}

fn default_send_buffer() -> usize {
    64
}
