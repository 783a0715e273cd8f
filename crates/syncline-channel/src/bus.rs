//! Typed event bus shared by channel dependents.
//!
//! Listeners receive every dispatched [`ServerMessage`]. A panicking
//! listener is caught and logged; remaining listeners for the same event
//! still run. Each dependent is responsible for removing its own listener
//! on teardown — the bus does not garbage-collect stale registrations.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, trace};

use syncline_core::types::id::ListenerId;

use crate::message::types::ServerMessage;

/// Callback invoked for each dispatched event.
pub type EventCallback = dyn Fn(&ServerMessage) + Send + Sync + 'static;

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    callback: Arc<EventCallback>,
}

/// Multi-subscriber dispatch table for channel events.
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. Returns the ID used to remove it.
    pub fn on(&self, callback: impl Fn(&ServerMessage) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId::new();
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.push(Registration {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a listener. Returns `false` if the ID was not registered.
    pub fn off(&self, id: &ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|reg| reg.id != *id);
        listeners.len() < before
    }

    /// Remove all listeners.
    pub fn clear(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the bus has no listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch an event to every registered listener.
    ///
    /// The listener list is snapshotted first, so listeners may register
    /// or remove listeners from inside a callback without deadlocking.
    pub fn dispatch(&self, message: &ServerMessage) {
        let snapshot: Vec<Registration> = {
            self.listeners
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        };
        trace!(listeners = snapshot.len(), "dispatching channel event");
        for registration in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| (registration.callback)(message)));
            if result.is_err() {
                error!(
                    listener = %registration.id,
                    "event listener panicked; continuing with remaining listeners"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
