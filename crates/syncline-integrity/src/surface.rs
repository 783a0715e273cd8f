//! Editing-surface attachment.
//!
//! The editing surface forwards raw input events over a channel; the
//! monitor consumes them on a background task. The returned guard detaches
//! deterministically on drop so no task outlives the surface it watches.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::paste::PasteInput;

/// Raw input events emitted by the editing surface.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    /// Content was pasted into the surface.
    Paste(PasteInput),
    /// A key was struck.
    Keystroke {
        /// When the keystroke occurred.
        at: DateTime<Utc>,
    },
}

impl SurfaceEvent {
    /// A keystroke happening now.
    pub fn keystroke() -> Self {
        Self::Keystroke { at: Utc::now() }
    }
}

/// Detach handle returned by [`IntegrityMonitor::attach`].
///
/// Dropping the guard (or calling [`SurfaceGuard::detach`]) stops the
/// observation task.
///
/// [`IntegrityMonitor::attach`]: crate::monitor::IntegrityMonitor::attach
#[derive(Debug)]
pub struct SurfaceGuard {
    handle: Option<JoinHandle<()>>,
}

impl SurfaceGuard {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Stop observing the surface.
    pub fn detach(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        self.abort();
    }
}
