//! Shared test helpers for integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use syncline::{
    AppError, AppResult, ChannelConfig, ClientMessage, ConflictPolicy, DocumentConfig, DocumentId,
    DocumentUpdatePayload, ServerMessage, SessionId, SyncConfig, Transport, TransportLink,
};

/// In-memory authority the channel connects to.
///
/// Scripted handshake outcomes, automatic acks, and remote-update
/// injection, standing in for the real WebSocket endpoint.
pub struct TestAuthority {
    inner: Arc<AuthorityInner>,
}

#[derive(Debug)]
struct AuthorityInner {
    /// Number of upcoming opens that fail at the transport layer.
    fail_opens: AtomicU32,
    /// Reject the authentication handshake.
    reject_handshake: AtomicBool,
    /// Acknowledge document updates automatically.
    auto_ack: AtomicBool,
    /// When set, reject document updates with this reason.
    reject_updates: Mutex<Option<String>>,
    /// Successful opens; each implies one handshake attempt.
    opens: AtomicU32,
    /// Every client message received, in order.
    received: Mutex<Vec<ClientMessage>>,
    /// Server-side handle of the currently live link.
    link: Mutex<Option<LiveLink>>,
}

#[derive(Debug)]
struct LiveLink {
    to_client: mpsc::Sender<ServerMessage>,
    cancel: CancellationToken,
}

impl TestAuthority {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AuthorityInner {
                fail_opens: AtomicU32::new(0),
                reject_handshake: AtomicBool::new(false),
                auto_ack: AtomicBool::new(true),
                reject_updates: Mutex::new(None),
                opens: AtomicU32::new(0),
                received: Mutex::new(Vec::new()),
                link: Mutex::new(None),
            }),
        }
    }

    /// Transport handle to pass to the channel manager.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(MemoryTransport {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Make the next `n` opens fail at the transport layer.
    pub fn fail_next_opens(&self, n: u32) {
        self.inner.fail_opens.store(n, Ordering::SeqCst);
    }

    /// Opens still scheduled to fail.
    pub fn fail_opens_remaining(&self) -> u32 {
        self.inner.fail_opens.load(Ordering::SeqCst)
    }

    /// Reject (or accept) the authentication handshake.
    pub fn reject_handshake(&self, reject: bool) {
        self.inner.reject_handshake.store(reject, Ordering::SeqCst);
    }

    /// Stop (or resume) acknowledging document updates.
    pub fn set_auto_ack(&self, auto_ack: bool) {
        self.inner.auto_ack.store(auto_ack, Ordering::SeqCst);
    }

    /// Reject document updates with the given reason.
    pub fn reject_updates(&self, reason: &str) {
        *self.inner.reject_updates.lock().unwrap() = Some(reason.to_string());
    }

    /// Number of successful opens (= handshakes attempted).
    pub fn handshake_count(&self) -> u32 {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// All client messages received so far.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.inner.received.lock().unwrap().clone()
    }

    /// Document update payloads received so far.
    pub fn received_updates(&self) -> Vec<DocumentUpdatePayload> {
        self.received()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::DocumentUpdate { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Rooms joined, as `kind:id` names.
    pub fn joined_room_names(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|msg| match msg {
                ClientMessage::JoinRoom { kind, id } => Some(format!("{kind}:{id}")),
                _ => None,
            })
            .collect()
    }

    /// Push a message to the connected client.
    pub async fn push(&self, msg: ServerMessage) {
        let to_client = {
            let link = self.inner.link.lock().unwrap();
            link.as_ref()
                .map(|l| l.to_client.clone())
                .expect("no live link to push on")
        };
        to_client.send(msg).await.expect("client receiver dropped");
    }

    /// Push a remote document update.
    pub async fn push_document_update(&self, document_id: DocumentId, content: &str) {
        self.push(ServerMessage::DocumentUpdated {
            document_id,
            content: content.to_string(),
            updated_at: chrono::Utc::now(),
        })
        .await;
    }

    /// Kill the live link, simulating a network drop.
    pub fn drop_link(&self) {
        let mut link = self.inner.link.lock().unwrap();
        if let Some(live) = link.take() {
            live.cancel.cancel();
        }
    }
}

impl AuthorityInner {
    async fn handle_client_message(
        &self,
        msg: ClientMessage,
        reply: &mpsc::Sender<ServerMessage>,
    ) {
        self.received.lock().unwrap().push(msg.clone());
        match msg {
            ClientMessage::Authenticate { .. } => {
                if self.reject_handshake.load(Ordering::SeqCst) {
                    let _ = reply
                        .send(ServerMessage::Error {
                            code: "AUTH".to_string(),
                            message: "invalid token".to_string(),
                        })
                        .await;
                } else {
                    let _ = reply
                        .send(ServerMessage::Welcome {
                            session_id: SessionId::new(),
                        })
                        .await;
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = reply.send(ServerMessage::Pong { timestamp }).await;
            }
            ClientMessage::JoinRoom { kind, id } => {
                let _ = reply.send(ServerMessage::RoomJoined { kind, id }).await;
            }
            ClientMessage::LeaveRoom { .. } => {}
            ClientMessage::DocumentUpdate { request_id, .. } => {
                let rejection = self.reject_updates.lock().unwrap().clone();
                if let Some(reason) = rejection {
                    let _ = reply
                        .send(ServerMessage::Ack {
                            request_id,
                            ok: false,
                            error: Some(reason),
                        })
                        .await;
                } else if self.auto_ack.load(Ordering::SeqCst) {
                    let _ = reply
                        .send(ServerMessage::Ack {
                            request_id,
                            ok: true,
                            error: None,
                        })
                        .await;
                }
            }
        }
    }
}

/// Transport side of [`TestAuthority`].
#[derive(Debug, Clone)]
struct MemoryTransport {
    inner: Arc<AuthorityInner>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self) -> AppResult<TransportLink> {
        let inner = Arc::clone(&self.inner);
        if inner.fail_opens.load(Ordering::SeqCst) > 0 {
            inner.fail_opens.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::connection("simulated connect failure"));
        }
        inner.opens.fetch_add(1, Ordering::SeqCst);

        let (client_tx, mut client_rx) = mpsc::channel::<ClientMessage>(64);
        let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(64);
        let cancel = CancellationToken::new();

        {
            let mut link = inner.link.lock().unwrap();
            if let Some(old) = link.take() {
                old.cancel.cancel();
            }
            *link = Some(LiveLink {
                to_client: server_tx.clone(),
                cancel: cancel.clone(),
            });
        }

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    msg = client_rx.recv() => {
                        let Some(msg) = msg else { break };
                        inner.handle_client_message(msg, &server_tx).await;
                    }
                }
            }
        });

        Ok(TransportLink {
            sender: client_tx,
            receiver: server_rx,
            cancel,
        })
    }
}

/// Configuration with short timers suitable for paused-clock tests.
pub fn test_config(policy: ConflictPolicy) -> SyncConfig {
    SyncConfig {
        channel: ChannelConfig {
            reconnect_delay_ms: 50,
            max_reconnect_attempts: 3,
            ack_timeout_ms: 500,
            ..ChannelConfig::default()
        },
        document: DocumentConfig {
            auto_save_delay_ms: 100,
            conflict_policy: policy,
            ..DocumentConfig::default()
        },
        ..SyncConfig::default()
    }
}

/// Let queued tasks and in-flight messages settle.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
