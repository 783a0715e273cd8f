//! Transport seam between the channel manager and the wire.
//!
//! The manager speaks [`ClientMessage`]/[`ServerMessage`] over an opened
//! [`TransportLink`]; how frames actually move is the transport's concern.
//! Production uses [`WsTransport`]; tests substitute an in-memory
//! implementation.

use std::fmt;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use syncline_core::config::channel::ChannelConfig;
use syncline_core::{AppError, AppResult};

use crate::message::types::{ClientMessage, ServerMessage};

/// An open bidirectional link to the authority.
///
/// Dropping the receiver or cancelling the token tears the link down.
#[derive(Debug)]
pub struct TransportLink {
    /// Outbound message sink.
    pub sender: mpsc::Sender<ClientMessage>,
    /// Inbound message stream. Yields `None` when the link is lost.
    pub receiver: mpsc::Receiver<ServerMessage>,
    /// Cancels the link's background tasks.
    pub cancel: CancellationToken,
}

/// Trait for channel transports (WebSocket in production, in-memory in tests).
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// Open a fresh link to the authority.
    ///
    /// Authentication happens after open: the manager sends
    /// [`ClientMessage::Authenticate`] as the first frame.
    async fn open(&self) -> AppResult<TransportLink>;
}

/// WebSocket transport speaking JSON text frames.
#[derive(Debug, Clone)]
pub struct WsTransport {
    endpoint: String,
    send_buffer: usize,
}

impl WsTransport {
    /// Create a transport for the configured endpoint.
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            send_buffer: config.send_buffer_size,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> AppResult<TransportLink> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| {
                AppError::connection(format!("WebSocket connect to {} failed: {e}", self.endpoint))
            })?;

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (client_tx, mut client_rx) = mpsc::channel::<ClientMessage>(self.send_buffer);
        let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(self.send_buffer);
        let cancel = CancellationToken::new();

        // Outbound pump: serialize client messages onto the socket.
        let write_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = write_cancel.cancelled() => break,
                    msg = client_rx.recv() => {
                        let Some(msg) = msg else { break };
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!(error = %e, "failed to serialize outbound frame");
                                continue;
                            }
                        };
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = ws_tx.close().await;
        });

        // Inbound pump: parse socket frames into server messages. Closing
        // `server_tx` is what signals link loss to the manager.
        let read_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = read_cancel.cancelled() => break,
                    frame = ws_rx.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerMessage>(text.as_str()) {
                                    Ok(msg) => {
                                        if server_tx.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!(error = %e, "dropping unparseable frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "WebSocket read error");
                                break;
                            }
                        }
                    }
                }
            }
            read_cancel.cancel();
        });

        Ok(TransportLink {
            sender: client_tx,
            receiver: server_rx,
            cancel,
        })
    }
}
