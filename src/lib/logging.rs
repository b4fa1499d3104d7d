//! Formatting helpers and summaries for log output.
//!
//! Counts, percentages, durations and rates are formatted the same way in
//! every stage so that progress lines and the final run summary line up.

use std::time::{Duration, Instant};

use crate::metrics::RunMetrics;

/// Formats a count with thousands separators.
///
/// ```
/// use watchcount_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` places.
///
/// ```
/// use watchcount_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(0.5, 1), "50.0%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form ("45s", "2m 15s", "1h 30m").
///
/// ```
/// use watchcount_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a processing rate (items per second, or per minute when slow).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        let items_per_min = count as f64 / (secs / 60.0);
        format!("{items_per_min:.1} items/min")
    }
}

/// Logs the end-of-run summary.
pub fn log_run_summary(metrics: &RunMetrics) {
    log::info!("=== Summary ===");
    log::info!("  Strategy: {}", metrics.strategy);
    log::info!("  Rows extracted: {}", format_count(metrics.rows_extracted));
    log::info!("  Rows aggregated: {}", format_count(metrics.rows_aggregated));
    log::info!("  Distinct keys: {}", format_count(metrics.aggregate_records));

    if metrics.strategy != "none" {
        log::info!("  Canonical entities: {}", format_count(metrics.entities_extracted));
        log::info!("  Backed keys: {}", format_count(metrics.backed_keys));
        log::info!(
            "  Dangling keys: {} ({} of aggregated keys)",
            format_count(metrics.dangling_keys),
            format_percent(metrics.dangling_fraction, 2)
        );
    }

    log::info!("  Output records: {}", format_count(metrics.output_records));
    log::info!(
        "  Elapsed: {}",
        format_duration(Duration::from_secs_f64(metrics.elapsed_seconds.max(0.0)))
    );
}

/// Operation timing helper.
///
/// Logs the start of an operation on creation and its count, duration and
/// rate on completion.
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time elapsed since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
