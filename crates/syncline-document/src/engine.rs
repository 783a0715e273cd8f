//! Synchronization engine — keeps one document eventually consistent
//! with the authority while editing is in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use syncline_channel::message::types::{ClientMessage, DocumentUpdatePayload, ServerMessage};
use syncline_channel::ChannelManager;
use syncline_core::config::document::{ConflictPolicy, DocumentConfig};
use syncline_core::types::id::{ConflictId, DocumentId, ListenerId, RequestId};
use syncline_core::{AppError, AppResult};

use crate::conflict::{three_way_merge, Conflict, ConflictResolution};
use crate::debounce::Debouncer;
use crate::fallback::AuthorityClient;
use crate::state::{DocumentSnapshot, DocumentState, SaveStatus};

/// Content synchronization engine for a single document.
///
/// Local edits go through [`SyncEngine::update_content`], which re-arms a
/// debounce timer; once edits pause, the engine sends the content to the
/// authority over the channel and waits for the acknowledgment. Remote
/// updates arrive through the channel's event bus. Conflicts are detected
/// when a divergent remote update lands on a dirty document and are
/// handled by the configured [`ConflictPolicy`].
///
/// The engine unsubscribes its channel listener and cancels its debounce
/// timer on [`SyncEngine::close`] (also run on drop).
pub struct SyncEngine {
    channel: Arc<ChannelManager>,
    config: DocumentConfig,
    fallback: Option<AuthorityClient>,
    document_id: DocumentId,
    state: Mutex<DocumentState>,
    debouncer: Debouncer,
    listener: Mutex<Option<ListenerId>>,
    closed: AtomicBool,
    weak: Weak<SyncEngine>,
}

impl SyncEngine {
    /// Create an engine for one document and subscribe it to the
    /// channel's event bus.
    pub fn new(
        channel: Arc<ChannelManager>,
        config: DocumentConfig,
        fallback: Option<AuthorityClient>,
        document_id: DocumentId,
        initial_content: impl Into<String>,
    ) -> Arc<Self> {
        let engine = Arc::new_cyclic(|weak| Self {
            channel,
            config,
            fallback,
            document_id,
            state: Mutex::new(DocumentState::new(document_id, initial_content.into())),
            debouncer: Debouncer::new(),
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
            weak: weak.clone(),
        });

        engine.resubscribe();
        engine
    }

    /// (Re)register the channel event listener.
    ///
    /// An explicit `disconnect` clears the channel's listener table, so
    /// dependents must re-register after an explicit reconnect. Replaces
    /// any previous registration.
    pub fn resubscribe(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut guard = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = guard.take() {
            self.channel.off(&old);
        }
        let weak = self.weak.clone();
        *guard = Some(self.channel.on(move |msg| {
            if let Some(engine) = weak.upgrade() {
                engine.handle_channel_event(msg);
            }
        }));
    }

    /// Apply a local edit.
    ///
    /// Pure local state update: sets the content, recomputes the dirty
    /// flag, clears any stale error, and re-arms the debounce timer.
    /// Nothing is sent until the timer fires.
    pub fn update_content(&self, new_content: &str) {
        if self.closed.load(Ordering::SeqCst) {
            warn!(document_id = %self.document_id, "update_content ignored: engine closed");
            return;
        }
        {
            let mut state = self.lock_state();
            state.local_content = new_content.to_string();
            state.recompute_dirty();
            state.last_error = None;
        }
        self.arm_debounce();
    }

    /// Send now, bypassing the debounce timer.
    ///
    /// Used for explicit "save now" and "retry" actions. When the channel
    /// is down, this path additionally tries the HTTP fallback endpoint.
    pub async fn force_save(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::internal("sync engine closed"));
        }
        self.debouncer.cancel();
        self.save(true).await
    }

    /// Reset local content to the last confirmed authority content.
    pub fn discard_changes(&self) {
        self.debouncer.cancel();
        let mut state = self.lock_state();
        state.local_content = state.last_known_authority_content.clone();
        state.dirty = false;
        state.last_error = None;
        debug!(document_id = %state.document_id, "local changes discarded");
    }

    /// Resolve a pending conflict with an explicit, caller-chosen
    /// resolution, independent of the default policy.
    pub fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        resolution: ConflictResolution,
    ) -> AppResult<()> {
        if resolution == ConflictResolution::Unresolved {
            return Err(AppError::conflict(
                "a conflict cannot be resolved to unresolved",
            ));
        }
        let rearm = {
            let mut state = self.lock_state();
            let index = state
                .pending_conflicts
                .iter()
                .position(|c| c.id == conflict_id)
                .ok_or_else(|| AppError::conflict(format!("unknown conflict {conflict_id}")))?;
            if state.pending_conflicts[index].resolved {
                return Err(AppError::conflict(format!(
                    "conflict {conflict_id} is already resolved"
                )));
            }

            let remote = state.pending_conflicts[index].remote_content.clone();
            match resolution {
                ConflictResolution::Server => {
                    state.local_content = remote.clone();
                    state.last_known_authority_content = remote;
                    state.recompute_dirty();
                }
                ConflictResolution::Client => {
                    state.last_known_authority_content = remote;
                    state.recompute_dirty();
                }
                ConflictResolution::Merge => {
                    let merged = three_way_merge(
                        &state.last_known_authority_content,
                        &state.local_content,
                        &remote,
                    );
                    state.local_content = merged;
                    state.last_known_authority_content = remote;
                    state.recompute_dirty();
                }
                ConflictResolution::Unresolved => unreachable!(),
            }
            state.pending_conflicts[index].resolve(resolution);
            info!(conflict_id = %conflict_id, resolution = ?resolution, "conflict resolved");
            state.dirty
        };
        if rearm {
            self.arm_debounce();
        }
        Ok(())
    }

    /// Read-only snapshot of the document state.
    pub fn snapshot(&self) -> DocumentSnapshot {
        self.lock_state().snapshot()
    }

    /// Derived save status.
    pub fn save_status(&self) -> SaveStatus {
        self.lock_state().save_status()
    }

    /// Whether local content diverges from the authority.
    pub fn has_unsaved_changes(&self) -> bool {
        self.lock_state().dirty
    }

    /// Whether new edits should be accepted.
    pub fn can_edit(&self) -> bool {
        self.lock_state().can_edit()
    }

    /// When the authority last confirmed a save.
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_synced_at
    }

    /// Current local content.
    pub fn content(&self) -> String {
        self.lock_state().local_content.clone()
    }

    /// The document this engine synchronizes.
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Tear down the engine: cancel the debounce timer and unsubscribe
    /// from the channel's event bus. Idempotent; also run on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.debouncer.cancel();
        if let Some(listener_id) = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            self.channel.off(&listener_id);
        }
        debug!(document_id = %self.document_id, "sync engine closed");
    }

    fn lock_state(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// (Re)arm the debounce timer for an automatic save.
    fn arm_debounce(&self) {
        let Some(engine) = self.weak.upgrade() else {
            return;
        };
        let delay = Duration::from_millis(self.config.auto_save_delay_ms);
        self.debouncer.arm(delay, move || async move {
            engine.auto_save().await;
        });
    }

    /// Debounced save path: failures are recorded on the document state
    /// and left for the caller to retry; nothing is retried silently.
    async fn auto_save(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.save(false).await {
            debug!(document_id = %self.document_id, error = %e, "debounced save failed; awaiting caller retry");
        }
    }

    /// Send the current local content to the authority.
    ///
    /// The conflict epoch is captured before sending: if a conflict is
    /// raised while the send is in flight, the eventual acknowledgment
    /// must not clobber it.
    async fn save(&self, allow_fallback: bool) -> AppResult<()> {
        let (payload, epoch) = {
            let mut state = self.lock_state();
            if state.unresolved_conflicts() > 0 {
                return Err(AppError::conflict(
                    "unresolved conflicts must be resolved before saving",
                ));
            }
            if !state.dirty {
                return Ok(());
            }
            if state.saving {
                debug!(document_id = %state.document_id, "save skipped: another send is in flight");
                return Ok(());
            }
            state.saving = true;
            (
                DocumentUpdatePayload {
                    document_id: state.document_id,
                    content: state.local_content.clone(),
                    timestamp: Utc::now(),
                    word_count: word_count(&state.local_content),
                },
                state.conflict_epoch,
            )
        };

        let result = if self.channel.is_connected() {
            let request_id = RequestId::new();
            self.channel
                .request(
                    request_id,
                    ClientMessage::DocumentUpdate {
                        request_id,
                        payload: payload.clone(),
                    },
                )
                .await
        } else if allow_fallback {
            match &self.fallback {
                Some(client) => client.save_document(&payload).await,
                None => Err(AppError::connection(
                    "channel not connected and no fallback endpoint configured",
                )),
            }
        } else {
            Err(AppError::connection("channel not connected"))
        };

        match result {
            Ok(()) => {
                let mut state = self.lock_state();
                state.saving = false;
                if state.conflict_epoch == epoch {
                    state.last_known_authority_content = payload.content;
                    state.recompute_dirty();
                    state.last_synced_at = Some(Utc::now());
                    state.last_error = None;
                    debug!(document_id = %state.document_id, "document saved");
                } else {
                    warn!(
                        document_id = %state.document_id,
                        "save acknowledged after a conflict was raised; keeping conflict state"
                    );
                }
                Ok(())
            }
            Err(e) => {
                let mut state = self.lock_state();
                state.saving = false;
                state.last_error = Some(e.to_string());
                warn!(document_id = %state.document_id, error = %e, "document save failed");
                Err(e)
            }
        }
    }

    /// Filter channel events down to updates for this document.
    fn handle_channel_event(&self, msg: &ServerMessage) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let ServerMessage::DocumentUpdated {
            document_id,
            content,
            ..
        } = msg
        {
            if *document_id == self.document_id {
                self.apply_remote_update(content);
            }
        }
    }

    /// Apply a remote update, detecting and handling conflicts.
    ///
    /// The whole check-and-apply runs under one lock so the conflict
    /// decision is atomic with respect to the update it reacts to: the
    /// comparison always uses the pre-send authority content.
    fn apply_remote_update(&self, remote: &str) {
        let rearm = {
            let mut state = self.lock_state();
            if remote == state.last_known_authority_content {
                trace!(document_id = %state.document_id, "remote update is a stale echo; ignoring");
                return;
            }
            if !state.dirty {
                state.local_content = remote.to_string();
                state.last_known_authority_content = remote.to_string();
                debug!(document_id = %state.document_id, "adopted remote update");
                false
            } else {
                let mut conflict = Conflict::new(state.local_content.clone(), remote.to_string());
                state.conflict_epoch += 1;

                let rearm = match self.config.conflict_policy {
                    ConflictPolicy::Server => {
                        state.local_content = remote.to_string();
                        state.last_known_authority_content = remote.to_string();
                        state.recompute_dirty();
                        conflict.resolve(ConflictResolution::Server);
                        false
                    }
                    ConflictPolicy::Client => {
                        state.last_known_authority_content = remote.to_string();
                        state.recompute_dirty();
                        conflict.resolve(ConflictResolution::Client);
                        state.dirty
                    }
                    ConflictPolicy::Merge => {
                        let merged = three_way_merge(
                            &state.last_known_authority_content,
                            &state.local_content,
                            remote,
                        );
                        state.local_content = merged;
                        state.last_known_authority_content = remote.to_string();
                        state.recompute_dirty();
                        conflict.resolve(ConflictResolution::Merge);
                        state.dirty
                    }
                    ConflictPolicy::Manual => false,
                };

                info!(
                    document_id = %state.document_id,
                    conflict_id = %conflict.id,
                    policy = ?self.config.conflict_policy,
                    "remote update conflicted with local edits"
                );
                state.pending_conflicts.push(conflict);
                rearm
            }
        };
        if rearm {
            self.arm_debounce();
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("document_id", &self.document_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Word count sent alongside each update payload.
fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}
