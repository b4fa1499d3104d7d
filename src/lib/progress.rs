//! Progress tracking utilities
//!
//! A tracker keeps a running count for one pipeline stage and logs each time
//! the count crosses a multiple of its interval. Stages run on a single
//! thread, so the tracker is a plain counter owned by the stage.

use log::info;

use crate::logging::format_count;

/// Default number of items between progress messages.
pub const DEFAULT_INTERVAL: u64 = 100_000;

/// Progress tracker logging at regular intervals.
///
/// # Example
/// ```
/// use watchcount_lib::progress::ProgressTracker;
///
/// let mut tracker = ProgressTracker::new("Aggregated rows").with_interval(100);
/// for _ in 0..250 {
///     tracker.add(1); // Logs at 100, 200
/// }
/// tracker.log_final(); // Logs "Aggregated rows 250 (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    /// Progress is logged when the count crosses multiples of this.
    interval: u64,
    /// Message prefix for log output.
    message: String,
    count: u64,
}

impl ProgressTracker {
    /// Create a tracker with the default interval.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: DEFAULT_INTERVAL, message: message.into(), count: 0 }
    }

    /// Set the logging interval (values below 1 are treated as 1).
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Add to the count, logging once per interval boundary crossed.
    ///
    /// Returns `true` if the new count lies exactly on an interval boundary.
    pub fn add(&mut self, additional: u64) -> bool {
        let prev = self.count;
        self.count = prev.saturating_add(additional);

        for i in (prev / self.interval + 1)..=(self.count / self.interval) {
            info!("{} {}", self.message, format_count(i * self.interval));
        }
        self.on_boundary()
    }

    /// Log the final count unless the last [`ProgressTracker::add`] already did.
    pub fn log_final(&self) {
        if self.count > 0 && !self.on_boundary() {
            info!("{} {} (complete)", self.message, format_count(self.count));
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    fn on_boundary(&self) -> bool {
        self.count > 0 && self.count.is_multiple_of(self.interval)
    }
}
