//! Typing-cadence analysis over a rolling keystroke window.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Number of most-recent intervals the burst rule inspects.
pub(crate) const BURST_SAMPLE: usize = 10;

/// Rolling window of keystroke timestamps.
#[derive(Debug)]
pub(crate) struct CadenceTracker {
    timestamps: VecDeque<DateTime<Utc>>,
    window: usize,
}

impl CadenceTracker {
    pub fn new(window: usize) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Record a keystroke and report whether it completes a suspicious
    /// burst.
    ///
    /// A burst is flagged when, over the most recent [`BURST_SAMPLE`]
    /// intervals, the mean is below `mean_threshold_ms` AND every single
    /// interval is below `max_interval_ms` — a cadence characteristic of
    /// programmatic injection rather than human typing.
    pub fn record(
        &mut self,
        at: DateTime<Utc>,
        mean_threshold_ms: u64,
        max_interval_ms: u64,
    ) -> bool {
        self.timestamps.push_back(at);
        while self.timestamps.len() > self.window {
            self.timestamps.pop_front();
        }

        if self.timestamps.len() < BURST_SAMPLE + 1 {
            return false;
        }

        let recent: Vec<&DateTime<Utc>> = self
            .timestamps
            .iter()
            .rev()
            .take(BURST_SAMPLE + 1)
            .collect();

        // `recent` is newest-first; walk consecutive pairs for intervals.
        let mut total_ms: u64 = 0;
        for pair in recent.windows(2) {
            let interval_ms = pair[0]
                .signed_duration_since(*pair[1])
                .num_milliseconds()
                .max(0) as u64;
            if interval_ms >= max_interval_ms {
                return false;
            }
            total_ms += interval_ms;
        }

        let mean_ms = total_ms / BURST_SAMPLE as u64;
        mean_ms < mean_threshold_ms
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }
}
