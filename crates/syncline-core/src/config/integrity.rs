//! Integrity monitor configuration.

use serde::{Deserialize, Serialize};

/// Integrity monitor thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Pasted-text length (in characters) above which a paste is
    /// classified suspicious.
    #[serde(default = "default_paste_length_threshold")]
    pub paste_length_threshold: usize,
    /// Mean inter-keystroke interval (milliseconds) below which a run of
    /// keystrokes is classified as a programmatic burst.
    #[serde(default = "default_burst_mean")]
    pub burst_mean_ms: u64,
    /// Upper bound (milliseconds) that every interval in a burst must stay
    /// under for the burst rule to fire.
    #[serde(default = "default_burst_max_interval")]
    pub burst_max_interval_ms: u64,
    /// Number of keystroke timestamps retained in the rolling window.
    #[serde(default = "default_keystroke_window")]
    pub keystroke_window: usize,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            paste_length_threshold: default_paste_length_threshold(),
            burst_mean_ms: default_burst_mean(),
            burst_max_interval_ms: default_burst_max_interval(),
            keystroke_window: default_keystroke_window(),
        }
    }
}

fn default_paste_length_threshold() -> usize {
    500
}

fn default_burst_mean() -> u64 {
    50
}

fn default_burst_max_interval() -> u64 {
    100
}

fn default_keystroke_window() -> usize {
    100
}
