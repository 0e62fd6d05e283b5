//! Throughput and ETA tracking for a fetch run
//!
//! Purely observational: the sink does not depend on any of this.

use std::time::{Duration, Instant};

use super::retry::CoverResult;

/// Counters over the completion stream
pub struct ProgressTracker {
    total: usize,
    processed: usize,
    found: usize,
    start: Instant,
}

/// Derived throughput numbers for one progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub found: usize,
    pub total: usize,
    /// Completions per second since the run started
    pub rate: f64,
    /// Estimated time until the last completion; zero while the rate is
    /// still unknown
    pub eta: Duration,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            found: 0,
            start: Instant::now(),
        }
    }

    /// Count one completion from the stream.
    pub fn observe(&mut self, result: &CoverResult) {
        self.processed += 1;
        if result.cover_url.is_some() {
            self.found += 1;
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn found(&self) -> usize {
        self.found
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_with_elapsed(self.start.elapsed())
    }

    /// Snapshot against an explicit elapsed time. `snapshot()` delegates
    /// here; tests use it directly to pin the clock.
    pub fn snapshot_with_elapsed(&self, elapsed: Duration) -> ProgressSnapshot {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(self.processed);
        let eta = if rate > 0.0 {
            Duration::from_secs_f64(remaining as f64 / rate)
        } else {
            Duration::ZERO
        };

        ProgressSnapshot {
            processed: self.processed,
            found: self.found,
            total: self.total,
            rate,
            eta,
        }
    }
}

/// Render a duration as H:MM:SS for progress lines.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
