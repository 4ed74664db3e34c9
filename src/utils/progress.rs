//! Progress tracking for long-running fetch loops.
//!
//! Progress is reported through `tracing` at a fixed interval rather than
//! drawn on the terminal, so it lands in the same log stream as the
//! skip and backoff messages that explain any shortfall.
//!
//! # Usage
//!
//! ```ignore
//! use chronicling_harvester::utils::ProgressReporter;
//!
//! let reporter = ProgressReporter::new("Fetching metadata", 100);
//! for i in 0..100 {
//!     // Do some work...
//!     reporter.inc();
//! }
//! reporter.finish();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress reporter logging every `interval` units
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    /// Name of the operation being tracked
    name: String,

    /// Total units of work (0 if unknown)
    total: usize,

    /// Current progress (atomic for thread safety)
    current: Arc<AtomicUsize>,

    /// Start time for calculating ETA
    start_time: Instant,

    /// Units between log lines
    interval: usize,

    /// Whether to log progress
    quiet: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    ///
    /// - `name`: Description of the operation
    /// - `total`: Total number of units of work (0 for indeterminate)
    pub fn new(name: &str, total: usize) -> Self {
        Self {
            name: name.to_string(),
            total,
            current: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
            interval: 10,
            quiet: false,
        }
    }

    /// Create a reporter that doesn't log anything
    pub fn quiet(name: &str, total: usize) -> Self {
        Self {
            quiet: true,
            ..Self::new(name, total)
        }
    }

    /// Increment progress by one unit
    pub fn inc(&self) {
        let new_value = self.current.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.quiet && new_value % self.interval == 0 {
            self.log_progress(new_value);
        }
    }

    fn log_progress(&self, current: usize) {
        let elapsed = self.start_time.elapsed();

        if self.total > 0 {
            let percent = (current as f64 / self.total as f64 * 100.0).min(100.0);
            tracing::info!(
                "{}: [{:>3.0}%] {}/{} ({} elapsed, ETA {})",
                self.name,
                percent,
                current,
                self.total,
                Self::format_duration(elapsed),
                Self::format_duration(self.estimate_eta(current))
            );
        } else {
            tracing::info!(
                "{}: {} done ({} elapsed)",
                self.name,
                current,
                Self::format_duration(elapsed)
            );
        }
    }

    /// Estimate time remaining
    fn estimate_eta(&self, current: usize) -> Duration {
        if current == 0 {
            return Duration::ZERO;
        }

        let elapsed = self.start_time.elapsed();
        let per_unit_secs = elapsed.as_secs_f64() / current as f64;
        let remaining = self.total.saturating_sub(current);

        Duration::from_secs((per_unit_secs * remaining as f64) as u64)
    }

    /// Format duration for display
    fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();

        if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}s", secs)
        }
    }

    /// Log final stats
    pub fn finish(&self) {
        let current = self.current();
        let elapsed = self.start_time.elapsed();

        if !self.quiet {
            tracing::info!(
                "{}: completed {}/{} in {}",
                self.name,
                current,
                self.total,
                Self::format_duration(elapsed)
            );
        }
    }

    /// Get the current progress count
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}
