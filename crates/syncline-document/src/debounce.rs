//! Cancellable debounce timer.
//!
//! Each re-arm aborts the previous pending timer, so a burst of edits
//! produces exactly one fire once the burst stops. The handle is owned by
//! the engine instance and cancelled deterministically on teardown — a
//! timer must never fire against a torn-down document.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owns at most one pending delayed action.
#[derive(Debug, Default)]
pub struct Debouncer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Create an idle debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)arm the timer: cancel any pending action and schedule `action`
    /// to run after `delay`.
    pub fn arm<F, Fut>(&self, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action().await;
        }));
    }

    /// Cancel the pending action, if any.
    pub fn cancel(&self) {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = guard.take() {
            pending.abort();
        }
    }

    /// Whether a timer is currently armed (the pending task may have
    /// already completed; this only reflects that one was scheduled).
    pub fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
