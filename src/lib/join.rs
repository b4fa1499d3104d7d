//! Joining aggregated counts against the canonical entity set.
//!
//! Two interchangeable strategies classify every aggregate record as backed
//! (its key names a canonical entity) or dangling:
//!
//! - [`semi_join`] looks each aggregate key up in an [`OrderedIndex`];
//! - [`merge_join`] walks the sorted canonical and aggregate artifacts with
//!   two cursors in a single forward pass.
//!
//! Both count and report dangling keys the same way, and both drop them from
//! the output unless `keep_dangling` is set, so for the same inputs they emit
//! the same records.
//!
//! Output lines are final results: `measure\tpart1\tpart2...`.

use std::path::{Path, PathBuf};

use log::info;

use crate::artifact::{ArtifactReader, ArtifactWriter, KeyedRecord};
use crate::errors::{Result, WatchCountError};
use crate::index::{OrderedIndex, Payload};
use crate::key::CompositeKey;
use crate::logging::{format_count, format_percent};
use crate::metrics::fraction;
use crate::progress::ProgressTracker;

/// Counters describing a completed join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Aggregate records examined.
    pub aggregates: u64,
    /// Canonical records read (sort-merge only).
    pub canonical_read: u64,
    /// Aggregate records whose key is a canonical entity.
    pub backed: u64,
    /// Aggregate records with no canonical entity.
    pub dangling: u64,
    /// Lines written to the output.
    pub output_records: u64,
}

impl JoinStats {
    /// Share of aggregate records that are dangling (0 when there are none).
    #[must_use]
    pub fn dangling_fraction(&self) -> f64 {
        fraction(self.dangling, self.aggregates)
    }

    fn log(&self, strategy: &str) {
        info!(
            "{} join: {} of {} keys backed, {} dangling ({} of aggregated keys)",
            strategy,
            format_count(self.backed),
            format_count(self.aggregates),
            format_count(self.dangling),
            format_percent(self.dangling_fraction(), 2)
        );
    }
}

/// Writes aggregate records as final output lines.
struct OutputSink {
    source: PathBuf,
    writer: ArtifactWriter,
}

impl OutputSink {
    fn create(source: &Path, output: &Path) -> Result<Self> {
        Ok(Self { source: source.to_path_buf(), writer: ArtifactWriter::create(output)? })
    }

    fn emit(&mut self, record: &KeyedRecord, line: u64) -> Result<()> {
        let parts = CompositeKey::from_encoded(record.key.as_str()).parts().map_err(|reason| {
            WatchCountError::MalformedRecord { path: self.source.clone(), line, reason }
        })?;
        self.writer.write_output(record.value, &parts)
    }

    fn finish(self) -> Result<u64> {
        self.writer.finish()
    }
}

/// Copies an aggregate artifact to the final output format unchanged.
pub fn export_aggregate(aggregate: &Path, output: &Path) -> Result<u64> {
    let mut sink = OutputSink::create(aggregate, output)?;
    for (line, record) in (1..).zip(ArtifactReader::open(aggregate)?) {
        sink.emit(&record?, line)?;
    }
    sink.finish()
}

/// Semi-join of an aggregate artifact against an ordered index.
pub fn semi_join<P: Payload>(
    aggregate: &Path,
    index: &mut OrderedIndex<P>,
    output: &Path,
    keep_dangling: bool,
) -> Result<JoinStats> {
    let mut stats = JoinStats::default();
    let mut sink = OutputSink::create(aggregate, output)?;
    let mut progress = ProgressTracker::new("Looked up aggregated keys");

    for record in ArtifactReader::open(aggregate)? {
        let record = record?;
        stats.aggregates += 1;
        let backed = index.get(&record.key)?.is_some();
        if backed {
            stats.backed += 1;
        } else {
            stats.dangling += 1;
        }
        if backed || keep_dangling {
            sink.emit(&record, stats.aggregates)?;
        }
        progress.add(1);
    }
    progress.log_final();

    stats.output_records = sink.finish()?;
    stats.log("Index");
    Ok(stats)
}

/// Sort-merge join of a sorted canonical artifact with a sorted aggregate
/// artifact.
pub fn merge_join(
    canonical: &Path,
    aggregate: &Path,
    output: &Path,
    keep_dangling: bool,
) -> Result<JoinStats> {
    let mut stats = JoinStats::default();
    let mut sink = OutputSink::create(aggregate, output)?;
    let mut canonical = SortedCursor::open(canonical)?;
    let mut aggregates = SortedCursor::open(aggregate)?;
    let mut progress = ProgressTracker::new("Joined aggregated keys");

    canonical.advance()?;
    aggregates.advance()?;
    while let (Some(entity), Some(record)) = (canonical.current(), aggregates.current()) {
        match entity.key.cmp(&record.key) {
            std::cmp::Ordering::Equal => {
                stats.backed += 1;
                sink.emit(record, aggregates.line())?;
                canonical.advance()?;
                aggregates.advance()?;
            }
            // Canonical entity nobody watches.
            std::cmp::Ordering::Less => canonical.advance()?,
            std::cmp::Ordering::Greater => {
                stats.dangling += 1;
                if keep_dangling {
                    sink.emit(record, aggregates.line())?;
                }
                aggregates.advance()?;
            }
        }
        progress.add(1);
    }

    // Aggregates left once the canonical stream is exhausted have no entity.
    while let Some(record) = aggregates.current() {
        stats.dangling += 1;
        if keep_dangling {
            sink.emit(record, aggregates.line())?;
        }
        aggregates.advance()?;
    }
    progress.log_final();

    stats.aggregates = aggregates.line();
    stats.canonical_read = canonical.line();
    stats.output_records = sink.finish()?;
    stats.log("Sort-merge");
    Ok(stats)
}

/// Forward cursor over a sorted artifact that rejects out-of-order keys.
struct SortedCursor {
    reader: ArtifactReader,
    current: Option<KeyedRecord>,
    line: u64,
}

impl SortedCursor {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self { reader: ArtifactReader::open(path)?, current: None, line: 0 })
    }

    fn current(&self) -> Option<&KeyedRecord> {
        self.current.as_ref()
    }

    /// Records consumed so far, which is also the line number of the current one.
    fn line(&self) -> u64 {
        self.line
    }

    fn advance(&mut self) -> Result<()> {
        let next = self.reader.next_record()?;
        if let (Some(previous), Some(next)) = (&self.current, &next) {
            if next.key < previous.key {
                let reason =
                    format!("key '{}' follows '{}' in sorted input", next.key, previous.key);
                return Err(WatchCountError::MalformedRecord {
                    path: self.reader.path().to_path_buf(),
                    line: self.line + 1,
                    reason,
                });
            }
        }
        if next.is_some() {
            self.line += 1;
        }
        self.current = next;
        Ok(())
    }
}
