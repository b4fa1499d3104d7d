//! Run metrics and TSV metrics files.

use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name for this metric type, used in error messages.
    fn metric_name() -> &'static str;
}

/// Counters and timing for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Join strategy used (`none`, `index` or `sort-merge`).
    pub strategy: String,
    /// Chunk size used for key-range extraction.
    pub chunk_size: u64,
    /// Bounded queries issued against the watch collection.
    pub watch_queries: u64,
    /// Raw watch rows written by the extractor.
    pub rows_extracted: u64,
    /// Sorted rows consumed by the run aggregator.
    pub rows_aggregated: u64,
    /// Distinct keys produced by the run aggregator.
    pub aggregate_records: u64,
    /// Canonical entities extracted (index entries or canonical rows).
    pub entities_extracted: u64,
    /// Aggregated keys backed by a canonical entity.
    pub backed_keys: u64,
    /// Aggregated keys with no canonical entity.
    pub dangling_keys: u64,
    /// `dangling_keys / aggregate_records` (0 when there are no aggregates).
    pub dangling_fraction: f64,
    /// Records written to the final output.
    pub output_records: u64,
    /// Wall-clock run time.
    pub elapsed_seconds: f64,
}

impl Metric for RunMetrics {
    fn metric_name() -> &'static str {
        "run"
    }
}

/// Fraction of `part` in `total`, 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction(part: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// Write metrics to a TSV file with consistent error handling.
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default().write_tsv(&path_ref, metrics).with_context(|| {
        format!("Failed to write {} metrics: {}", T::metric_name(), path_ref.display())
    })
}
