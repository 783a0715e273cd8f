//! Integrity monitor — bounded, passive risk-state tracking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use syncline_core::config::integrity::IntegrityConfig;

use crate::cadence::CadenceTracker;
use crate::paste::{classify_paste, PasteEvent, PasteInput};
use crate::surface::{SurfaceEvent, SurfaceGuard};

/// Maximum retained paste events; the oldest is evicted beyond this.
pub const RECENT_EVENTS_CAP: usize = 10;

/// Derived risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Two or fewer suspicious observations.
    Low,
    /// More than two suspicious observations.
    Medium,
    /// More than five suspicious observations.
    High,
}

impl RiskLevel {
    /// Derive the level from the monotonic suspicious-observation count.
    pub fn from_count(suspicious_count: u64) -> Self {
        if suspicious_count > 5 {
            Self::High
        } else if suspicious_count > 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Bounded risk state.
#[derive(Debug)]
struct RiskState {
    /// Recent paste events, oldest first, capped at [`RECENT_EVENTS_CAP`].
    events: VecDeque<PasteEvent>,
    /// Monotonic count of suspicious observations (pastes and bursts).
    suspicious_count: u64,
    /// Total pastes observed, suspicious or not.
    total_pastes: u64,
    /// Suspicious typing bursts detected.
    bursts_detected: u64,
    /// Keystroke timing window.
    cadence: CadenceTracker,
}

impl RiskState {
    fn new(keystroke_window: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(RECENT_EVENTS_CAP),
            suspicious_count: 0,
            total_pastes: 0,
            bursts_detected: 0,
            cadence: CadenceTracker::new(keystroke_window),
        }
    }
}

/// Aggregate counters and derived risk level.
///
/// A pure read: safe to request at any frequency without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityStats {
    /// Total pastes observed.
    pub total_pastes: u64,
    /// Monotonic suspicious-observation count.
    pub suspicious_count: u64,
    /// Suspicious typing bursts detected.
    pub bursts_detected: u64,
    /// Derived risk level.
    pub risk_level: RiskLevel,
    /// Recent paste events, oldest first.
    pub recent_events: Vec<PasteEvent>,
    /// Whether observation is currently enabled.
    pub monitoring_enabled: bool,
}

/// Passive behavioral-signal collector for one editing surface.
///
/// Never blocks or mutates document content; all observations are
/// advisory. Memory is bounded: the event log is capped and the keystroke
/// window rolls. Only the suspicious-observation count grows for the
/// lifetime of the monitoring session.
pub struct IntegrityMonitor {
    config: IntegrityConfig,
    enabled: AtomicBool,
    state: Mutex<RiskState>,
    weak: Weak<IntegrityMonitor>,
}

impl IntegrityMonitor {
    /// Create a monitor with observation enabled.
    pub fn new(config: IntegrityConfig) -> Arc<Self> {
        let keystroke_window = config.keystroke_window;
        Arc::new_cyclic(|weak| Self {
            config,
            enabled: AtomicBool::new(true),
            state: Mutex::new(RiskState::new(keystroke_window)),
            weak: weak.clone(),
        })
    }

    /// Observe a paste into the editing surface.
    pub fn record_paste(&self, input: &PasteInput) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let event = classify_paste(input, self.config.paste_length_threshold);

        let mut state = self.lock_state();
        state.total_pastes += 1;
        if event.suspicious {
            state.suspicious_count += 1;
            debug!(
                text_length = event.text_length,
                source = %event.source_guess,
                rich = event.has_rich_formatting,
                "suspicious paste observed"
            );
        }
        state.events.push_back(event);
        while state.events.len() > RECENT_EVENTS_CAP {
            state.events.pop_front();
        }
    }

    /// Observe a keystroke at the given time.
    pub fn record_keystroke(&self, at: DateTime<Utc>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.lock_state();
        let burst = state.cadence.record(
            at,
            self.config.burst_mean_ms,
            self.config.burst_max_interval_ms,
        );
        if burst {
            state.suspicious_count += 1;
            state.bursts_detected += 1;
            debug!("suspicious typing burst detected");
        }
    }

    /// Aggregate counters and derived risk level. Side-effect free.
    pub fn stats(&self) -> IntegrityStats {
        let state = self.lock_state();
        IntegrityStats {
            total_pastes: state.total_pastes,
            suspicious_count: state.suspicious_count,
            bursts_detected: state.bursts_detected,
            risk_level: RiskLevel::from_count(state.suspicious_count),
            recent_events: state.events.iter().cloned().collect(),
            monitoring_enabled: self.enabled.load(Ordering::SeqCst),
        }
    }

    /// Pause or resume observation. Collected history is retained.
    pub fn toggle_monitoring(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        debug!(enabled, "integrity monitoring toggled");
    }

    /// Reset all counters and history. An explicit caller action, never
    /// automatic.
    pub fn clear_data(&self) {
        let mut state = self.lock_state();
        *state = RiskState::new(self.config.keystroke_window);
        debug!("integrity data cleared");
    }

    /// Wire the monitor to an editing surface.
    ///
    /// Consumes [`SurfaceEvent`]s from the receiver on a background task.
    /// The returned guard detaches the task on drop.
    pub fn attach(&self, mut events: mpsc::Receiver<SurfaceEvent>) -> SurfaceGuard {
        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(monitor) = weak.upgrade() else {
                    return;
                };
                match event {
                    SurfaceEvent::Paste(input) => monitor.record_paste(&input),
                    SurfaceEvent::Keystroke { at } => monitor.record_keystroke(at),
                }
            }
        });
        SurfaceGuard::new(handle)
    }

    fn lock_state(&self) -> MutexGuard<'_, RiskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for IntegrityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityMonitor")
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish()
    }
}
