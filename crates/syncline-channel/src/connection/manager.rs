//! Channel manager — single source of truth for channel liveness and
//! event dispatch.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use syncline_core::config::channel::ChannelConfig;
use syncline_core::types::id::{ListenerId, RequestId, SessionId};
use syncline_core::{AppError, AppResult};

use crate::bus::EventBus;
use crate::message::types::{ClientMessage, ServerMessage};
use crate::room::{Room, RoomKind};

use super::heartbeat::run_heartbeat;
use super::state::ConnectionState;
use super::transport::{Transport, TransportLink};

/// Owns one logical bidirectional channel to the remote authority.
///
/// The manager is constructed explicitly and passed to dependents; there
/// is no process-global instance. Dependents subscribe to events through
/// [`ChannelManager::on`] and to connectivity through
/// [`ChannelManager::state_changes`], and must unsubscribe on their own
/// teardown.
pub struct ChannelManager {
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    bus: EventBus,
    state_tx: watch::Sender<ConnectionState>,
    pending_acks: DashMap<RequestId, oneshot::Sender<AppResult<()>>>,
    rooms: Mutex<HashSet<Room>>,
    inner: Mutex<Inner>,
    weak: Weak<ChannelManager>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Identity token retained for automatic reconnection.
    token: Option<String>,
    link_tx: Option<mpsc::Sender<ClientMessage>>,
    cancel: Option<CancellationToken>,
    session_id: Option<SessionId>,
}

impl ChannelManager {
    /// Create a new, disconnected channel manager.
    pub fn new(transport: Arc<dyn Transport>, config: ChannelConfig) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new_cyclic(|weak| Self {
            transport,
            config,
            bus: EventBus::new(),
            state_tx,
            pending_acks: DashMap::new(),
            rooms: Mutex::new(HashSet::new()),
            inner: Mutex::new(Inner::default()),
            weak: weak.clone(),
        })
    }

    /// Open and authenticate the channel.
    ///
    /// Idempotent: a no-op when already connected. Resolves once the
    /// handshake succeeds; rejects on handshake failure. Starts the
    /// heartbeat as a side effect.
    pub async fn connect(&self, token: &str) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if self.current_state().is_connected() {
            debug!("connect called while already connected; ignoring");
            return Ok(());
        }
        inner.token = Some(token.to_string());
        self.state_tx.send_replace(ConnectionState::Connecting);

        match self.establish(token).await {
            Ok((link_tx, receiver, cancel, session_id)) => {
                inner.link_tx = Some(link_tx.clone());
                inner.cancel = Some(cancel.clone());
                inner.session_id = Some(session_id);
                // State must flip before the reader starts: a link lost
                // instantly would otherwise race its Disconnected past us.
                self.state_tx.send_replace(ConnectionState::Connected);
                drop(inner);

                let interval = Duration::from_secs(self.config.ping_interval_seconds);
                tokio::spawn(run_heartbeat(link_tx, interval, cancel.clone()));
                self.spawn_reader(receiver, cancel);

                info!(session_id = %session_id, "channel connected");
                Ok(())
            }
            Err(e) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                warn!(error = %e, "channel handshake failed");
                Err(e)
            }
        }
    }

    /// Close the channel and tear down all channel-scoped state.
    ///
    /// Leaves all joined rooms, stops the heartbeat, clears the listener
    /// table, and suppresses automatic reconnection. Always safe to call.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.token = None;

        let rooms: Vec<Room> = self.rooms.lock().await.drain().collect();
        if let Some(link_tx) = &inner.link_tx {
            for room in &rooms {
                let _ = link_tx.try_send(ClientMessage::LeaveRoom {
                    kind: room.kind,
                    id: room.id.clone(),
                });
            }
        }

        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        inner.link_tx = None;
        inner.session_id = None;
        drop(inner);

        self.fail_pending_acks("channel disconnected");
        self.bus.clear();
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("channel disconnected");
    }

    /// Join a topic-scoped room.
    ///
    /// A no-op (logged, not an error) when not connected. Membership is
    /// not queued across disconnects; callers must re-join after
    /// reconnection.
    pub async fn join_room(&self, kind: RoomKind, id: impl Into<String>) {
        let id = id.into();
        let link_tx = { self.inner.lock().await.link_tx.clone() };
        let Some(link_tx) = link_tx else {
            warn!(kind = %kind, id = %id, "join_room ignored: channel not connected");
            return;
        };
        if link_tx
            .send(ClientMessage::JoinRoom {
                kind,
                id: id.clone(),
            })
            .await
            .is_err()
        {
            warn!(kind = %kind, id = %id, "join_room failed: channel closed");
            return;
        }
        self.rooms.lock().await.insert(Room::new(kind, id.clone()));
        debug!(kind = %kind, id = %id, "joined room");
    }

    /// Leave a topic-scoped room. A no-op when not connected.
    pub async fn leave_room(&self, kind: RoomKind, id: impl Into<String>) {
        let id = id.into();
        let link_tx = { self.inner.lock().await.link_tx.clone() };
        let Some(link_tx) = link_tx else {
            warn!(kind = %kind, id = %id, "leave_room ignored: channel not connected");
            return;
        };
        let _ = link_tx
            .send(ClientMessage::LeaveRoom {
                kind,
                id: id.clone(),
            })
            .await;
        self.rooms.lock().await.remove(&Room::new(kind, id.clone()));
        debug!(kind = %kind, id = %id, "left room");
    }

    /// Send a message without delivery guarantees.
    ///
    /// Fails silently (with a warning) when not connected: there is no
    /// send queue, and delivery is at-most-once.
    pub async fn emit(&self, msg: ClientMessage) {
        let link_tx = { self.inner.lock().await.link_tx.clone() };
        match link_tx {
            Some(tx) => {
                if tx.send(msg).await.is_err() {
                    warn!("emit dropped: channel closed");
                }
            }
            None => warn!("emit dropped: channel not connected"),
        }
    }

    /// Send a message and wait for the authority's acknowledgment.
    ///
    /// The `request_id` must match the correlation ID embedded in the
    /// message. Errors when not connected, when the authority rejects the
    /// request, or when no acknowledgment arrives within the configured
    /// timeout.
    pub async fn request(&self, request_id: RequestId, msg: ClientMessage) -> AppResult<()> {
        let link_tx = { self.inner.lock().await.link_tx.clone() }
            .ok_or_else(|| AppError::connection("channel not connected"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_acks.insert(request_id, reply_tx);

        if link_tx.send(msg).await.is_err() {
            self.pending_acks.remove(&request_id);
            return Err(AppError::connection("channel closed while sending"));
        }

        let timeout = Duration::from_millis(self.config.ack_timeout_ms);
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AppError::connection("channel lost before acknowledgment")),
            Err(_) => {
                self.pending_acks.remove(&request_id);
                Err(AppError::timeout("authority did not acknowledge the update"))
            }
        }
    }

    /// Register an event listener. Returns the ID used to remove it.
    pub fn on(&self, callback: impl Fn(&ServerMessage) + Send + Sync + 'static) -> ListenerId {
        self.bus.on(callback)
    }

    /// Remove an event listener.
    pub fn off(&self, id: &ListenerId) -> bool {
        self.bus.off(id)
    }

    /// Subscribe to connection-state changes, independent of the event bus.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Whether the channel is currently connected.
    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    /// Session assigned by the authority, when connected.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().await.session_id
    }

    /// Rooms currently joined.
    pub async fn joined_rooms(&self) -> Vec<Room> {
        self.rooms.lock().await.iter().cloned().collect()
    }

    /// Number of registered event listeners.
    pub fn listener_count(&self) -> usize {
        self.bus.len()
    }

    /// Open the transport and perform the authenticated handshake.
    async fn establish(
        &self,
        token: &str,
    ) -> AppResult<(
        mpsc::Sender<ClientMessage>,
        mpsc::Receiver<ServerMessage>,
        CancellationToken,
        SessionId,
    )> {
        let TransportLink {
            sender,
            mut receiver,
            cancel,
        } = self.transport.open().await?;

        sender
            .send(ClientMessage::Authenticate {
                token: token.to_string(),
            })
            .await
            .map_err(|_| AppError::handshake("channel closed before authentication"))?;

        let timeout = Duration::from_millis(self.config.handshake_timeout_ms);
        let reply = match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                cancel.cancel();
                return Err(AppError::handshake("channel closed during handshake"));
            }
            Err(_) => {
                cancel.cancel();
                return Err(AppError::handshake("handshake timed out"));
            }
        };

        match reply {
            ServerMessage::Welcome { session_id } => Ok((sender, receiver, cancel, session_id)),
            ServerMessage::Error { code, message } => {
                cancel.cancel();
                Err(AppError::handshake(format!(
                    "authority rejected handshake: {code}: {message}"
                )))
            }
            other => {
                cancel.cancel();
                Err(AppError::handshake(format!(
                    "unexpected handshake reply: {other:?}"
                )))
            }
        }
    }

    /// Consume inbound messages until the link closes or teardown.
    fn spawn_reader(&self, mut receiver: mpsc::Receiver<ServerMessage>, cancel: CancellationToken) {
        let Some(manager) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    msg = receiver.recv() => match msg {
                        Some(msg) => manager.handle_message(msg),
                        None => break,
                    }
                }
            }
            manager.handle_link_loss().await;
        });
    }

    /// Route one inbound message: acks resolve pending requests, pongs
    /// feed liveness, everything else goes to the event bus.
    fn handle_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Pong { .. } => {
                tracing::trace!("pong received");
            }
            ServerMessage::Ack {
                request_id,
                ok,
                error,
            } => match self.pending_acks.remove(&request_id) {
                Some((_, reply)) => {
                    let result = if ok {
                        Ok(())
                    } else {
                        Err(AppError::send(error.unwrap_or_else(|| {
                            "update rejected by authority".to_string()
                        })))
                    };
                    let _ = reply.send(result);
                }
                None => warn!(request_id = %request_id, "acknowledgment for unknown request"),
            },
            ServerMessage::Welcome { .. } => {
                debug!("unexpected welcome outside handshake; ignoring");
            }
            other => self.bus.dispatch(&other),
        }
    }

    /// React to an unexpected link loss: tear down the live link, notify
    /// state subscribers, and schedule automatic reconnection.
    ///
    /// Rooms are cleared and not re-joined automatically; dependents
    /// re-establish membership after reconnection. Listeners survive.
    async fn handle_link_loss(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.link_tx.is_none() {
                // Explicit disconnect already tore the link down.
                return;
            }
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            inner.link_tx = None;
            inner.session_id = None;
        }
        self.rooms.lock().await.clear();
        self.fail_pending_acks("channel lost before acknowledgment");
        self.state_tx.send_replace(ConnectionState::Disconnected);
        warn!("channel lost; scheduling automatic reconnection");
        self.spawn_reconnect();
    }

    /// Attempt reconnection on a fixed backoff, up to the configured
    /// budget. Exhausting the budget reports `Unreachable` exactly once.
    fn spawn_reconnect(&self) {
        let Some(manager) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let delay = Duration::from_millis(manager.config.reconnect_delay_ms);
            for attempt in 1..=manager.config.max_reconnect_attempts {
                tokio::time::sleep(delay).await;

                let token = {
                    let inner = manager.inner.lock().await;
                    match &inner.token {
                        Some(token) => token.clone(),
                        None => {
                            debug!("reconnection cancelled by explicit disconnect");
                            return;
                        }
                    }
                };
                if manager.current_state().is_connected() {
                    return;
                }

                info!(
                    attempt,
                    max = manager.config.max_reconnect_attempts,
                    "attempting reconnect"
                );
                match manager.connect(&token).await {
                    Ok(()) => return,
                    Err(e) => warn!(error = %e, attempt, "reconnect attempt failed"),
                }
            }
            error!("reconnect budget exhausted; authority unreachable");
            manager.state_tx.send_replace(ConnectionState::Unreachable);
        });
    }

    /// Resolve every pending acknowledgment with a connection error.
    fn fail_pending_acks(&self, reason: &str) {
        let pending: Vec<RequestId> = self.pending_acks.iter().map(|entry| *entry.key()).collect();
        for request_id in pending {
            if let Some((_, reply)) = self.pending_acks.remove(&request_id) {
                let _ = reply.send(Err(AppError::connection(reason)));
            }
        }
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("state", &self.current_state())
            .field("listeners", &self.bus.len())
            .finish()
    }
}
