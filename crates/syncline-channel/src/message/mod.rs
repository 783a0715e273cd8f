//! Wire message definitions for the authority channel.

pub mod types;

pub use types::{ClientMessage, DocumentUpdatePayload, ServerMessage};
