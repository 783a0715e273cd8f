//! # syncline-channel
//!
//! Channel layer for Syncline. Provides:
//!
//! - Connection lifecycle management with authenticated handshake
//! - Automatic reconnection with a bounded retry budget
//! - Liveness heartbeat
//! - Topic-scoped room membership
//! - A typed publish/subscribe event bus shared by all dependents

pub mod bus;
pub mod connection;
pub mod message;
pub mod room;

pub use bus::EventBus;
pub use connection::manager::ChannelManager;
pub use connection::state::ConnectionState;
pub use connection::transport::{Transport, TransportLink, WsTransport};
pub use message::types::{ClientMessage, DocumentUpdatePayload, ServerMessage};
pub use room::{Room, RoomKind};
