//! # Syncline
//!
//! Live synchronization core: keeps a single editable document consistent
//! between a client and the remote authority over a long-lived channel,
//! while passively scoring paste/typing behavior for integrity risk.
//!
//! [`SyncSession`] wires the three components together:
//!
//! - the channel manager (connection lifecycle, heartbeat, rooms, events)
//! - the synchronization engine (debounced saves, conflict handling)
//! - the integrity monitor (paste and typing-cadence observation)
//!
//! ```no_run
//! use syncline::{DocumentId, SyncConfig, SyncSession};
//!
//! # async fn run() -> syncline::AppResult<()> {
//! let config = SyncConfig::load("development")?;
//! let session = SyncSession::builder(config)
//!     .open("identity-token", DocumentId::new())
//!     .await?;
//!
//! session.update_content("Hello world");
//! session.force_save().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

pub use syncline_channel::{
    ChannelManager, ClientMessage, ConnectionState, DocumentUpdatePayload, EventBus, Room,
    RoomKind, ServerMessage, Transport, TransportLink, WsTransport,
};
pub use syncline_core::config::channel::ChannelConfig;
pub use syncline_core::config::document::{ConflictPolicy, DocumentConfig};
pub use syncline_core::config::integrity::IntegrityConfig;
pub use syncline_core::config::logging::LoggingConfig;
pub use syncline_core::config::SyncConfig;
pub use syncline_core::error::ErrorKind;
pub use syncline_core::types::id::{ConflictId, DocumentId, ListenerId, RequestId, SessionId};
pub use syncline_core::{AppError, AppResult};
pub use syncline_document::{
    AuthorityClient, Conflict, ConflictResolution, ConflictView, DocumentSnapshot, RemoteDocument,
    SaveStatus, SyncEngine,
};
pub use syncline_integrity::{
    IntegrityMonitor, IntegrityStats, PasteEvent, PasteInput, PasteSource, RiskLevel, SurfaceEvent,
    SurfaceGuard,
};

use chrono::{DateTime, Utc};

/// Initialize tracing/logging from the logging configuration.
///
/// Call once at startup; panics if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Builder for [`SyncSession`].
pub struct SyncSessionBuilder {
    config: SyncConfig,
    transport: Option<Arc<dyn Transport>>,
    initial_content: Option<String>,
}

impl SyncSessionBuilder {
    /// Start a builder from a configuration.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            transport: None,
            initial_content: None,
        }
    }

    /// Substitute the channel transport (tests use an in-memory one).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Seed the document content instead of fetching it over HTTP.
    pub fn initial_content(mut self, content: impl Into<String>) -> Self {
        self.initial_content = Some(content.into());
        self
    }

    /// Connect, join the document room, fetch the initial content, and
    /// wire the session together.
    pub async fn open(self, token: &str, document_id: DocumentId) -> AppResult<SyncSession> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransport::new(&self.config.channel)));
        let channel = ChannelManager::new(transport, self.config.channel.clone());

        channel.connect(token).await?;
        channel
            .join_room(RoomKind::Document, document_id.to_string())
            .await;

        let fallback = match &self.config.document.fallback_base_url {
            Some(base_url) => Some(AuthorityClient::new(
                base_url.clone(),
                Duration::from_millis(self.config.document.request_timeout_ms),
            )?),
            None => None,
        };

        let initial_content = match self.initial_content {
            Some(content) => content,
            None => match &fallback {
                Some(client) => client.fetch_document(document_id).await?.content,
                None => String::new(),
            },
        };

        let engine = SyncEngine::new(
            Arc::clone(&channel),
            self.config.document.clone(),
            fallback,
            document_id,
            initial_content,
        );
        let monitor = IntegrityMonitor::new(self.config.integrity.clone());

        let rejoin = spawn_rejoin_task(Arc::clone(&channel), document_id);

        Ok(SyncSession {
            channel,
            engine,
            monitor,
            document_id,
            rejoin,
        })
    }
}

/// One live editing session over a synchronized document.
///
/// The session is the stable interface the surrounding product calls
/// into; everything behind it is owned here and torn down by
/// [`SyncSession::close`].
pub struct SyncSession {
    channel: Arc<ChannelManager>,
    engine: Arc<SyncEngine>,
    monitor: Arc<IntegrityMonitor>,
    document_id: DocumentId,
    rejoin: JoinHandle<()>,
}

impl SyncSession {
    /// Start building a session.
    pub fn builder(config: SyncConfig) -> SyncSessionBuilder {
        SyncSessionBuilder::new(config)
    }

    // --- connectivity -----------------------------------------------------

    /// (Re)connect the channel and re-establish document-room membership.
    pub async fn connect(&self, token: &str) -> AppResult<()> {
        self.channel.connect(token).await?;
        self.engine.resubscribe();
        self.channel
            .join_room(RoomKind::Document, self.document_id.to_string())
            .await;
        Ok(())
    }

    /// Disconnect the channel. Safe to call at any time.
    pub async fn disconnect(&self) {
        self.channel.disconnect().await;
    }

    /// Whether the channel is currently connected.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Subscribe to connection-state changes for UI indicators.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.channel.state_changes()
    }

    // --- editing ----------------------------------------------------------

    /// Apply a local edit; propagation is debounced.
    pub fn update_content(&self, content: &str) {
        self.engine.update_content(content);
    }

    /// Save immediately, bypassing the debounce timer.
    pub async fn force_save(&self) -> AppResult<()> {
        self.engine.force_save().await
    }

    /// Reset local content to the last confirmed authority content.
    pub fn discard_changes(&self) {
        self.engine.discard_changes();
    }

    /// Resolve a pending conflict with an explicit resolution.
    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        resolution: ConflictResolution,
    ) -> AppResult<()> {
        self.engine.resolve_conflict(conflict_id, resolution)
    }

    // --- snapshots --------------------------------------------------------

    /// Read-only snapshot of the document state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        self.engine.snapshot()
    }

    /// When the authority last confirmed a save.
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.engine.last_saved()
    }

    /// Whether local content diverges from the authority.
    pub fn has_unsaved_changes(&self) -> bool {
        self.engine.has_unsaved_changes()
    }

    /// Derived save status.
    pub fn save_status(&self) -> SaveStatus {
        self.engine.save_status()
    }

    /// Pending conflicts, oldest first.
    pub fn conflicts(&self) -> Vec<ConflictView> {
        self.engine.snapshot().conflicts
    }

    /// Whether new edits should be accepted.
    pub fn can_edit(&self) -> bool {
        self.engine.can_edit()
    }

    // --- integrity --------------------------------------------------------

    /// Wire the integrity monitor to an editing surface. The returned
    /// guard detaches on drop.
    pub fn attach_editor(&self, events: mpsc::Receiver<SurfaceEvent>) -> SurfaceGuard {
        self.monitor.attach(events)
    }

    /// Integrity counters and derived risk level.
    pub fn integrity_stats(&self) -> IntegrityStats {
        self.monitor.stats()
    }

    /// Reset integrity counters and history.
    pub fn clear_integrity_data(&self) {
        self.monitor.clear_data();
    }

    /// Pause or resume integrity observation.
    pub fn toggle_monitoring(&self, enabled: bool) {
        self.monitor.toggle_monitoring(enabled);
    }

    // --- lifecycle --------------------------------------------------------

    /// The channel manager, for advanced callers.
    pub fn channel(&self) -> &Arc<ChannelManager> {
        &self.channel
    }

    /// Tear the session down: stop the engine, leave rooms, close the
    /// channel, and cancel all timers.
    pub async fn close(&self) {
        self.rejoin.abort();
        self.engine.close();
        self.channel.disconnect().await;
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.rejoin.abort();
        self.engine.close();
    }
}

/// Re-join the document room whenever the channel reconnects.
///
/// Room membership is not queued across disconnects, so the session (as
/// the channel's dependent) re-establishes it after each reconnection.
fn spawn_rejoin_task(channel: Arc<ChannelManager>, document_id: DocumentId) -> JoinHandle<()> {
    let mut states = channel.state_changes();
    tokio::spawn(async move {
        let mut was_connected = states.borrow().is_connected();
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            if state.is_connected() && !was_connected {
                channel
                    .join_room(RoomKind::Document, document_id.to_string())
                    .await;
            }
            was_connected = state.is_connected();
        }
    })
}
