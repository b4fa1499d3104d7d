//! Streaming run aggregation over a key-sorted artifact.
//!
//! Rows sharing a composite key must be contiguous in the input, which holds
//! whenever the input is totally ordered by key. The aggregator does not check
//! this: an unsorted input yields several records for the same key.

use std::path::Path;

use log::info;

use crate::artifact::{ArtifactReader, ArtifactWriter, KeyedRecord};
use crate::errors::{Result, WatchCountError};
use crate::progress::ProgressTracker;

/// Counters describing a completed aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Input rows consumed.
    pub rows_read: u64,
    /// Aggregate records written (one per distinct key).
    pub records_written: u64,
}

/// Merges contiguous equal-key records, summing their values.
///
/// Works over any record stream, so artifacts and in-memory rows share the
/// same algorithm.
pub struct RunAggregator<I> {
    input: I,
    current: Option<KeyedRecord>,
    rows_read: u64,
}

impl<I> RunAggregator<I>
where
    I: Iterator<Item = Result<KeyedRecord>>,
{
    /// Wraps a key-sorted record stream.
    pub fn new(input: I) -> Self {
        Self { input, current: None, rows_read: 0 }
    }

    /// Rows consumed from the input so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl<I> Iterator for RunAggregator<I>
where
    I: Iterator<Item = Result<KeyedRecord>>,
{
    type Item = Result<KeyedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.input.next() {
                Some(Ok(row)) => {
                    self.rows_read += 1;
                    match self.current.as_mut() {
                        Some(group) if group.key == row.key => {
                            group.value = match group.value.checked_add(row.value) {
                                Some(sum) => sum,
                                None => {
                                    let key = group.key.clone();
                                    return Some(Err(WatchCountError::MeasureOverflow { key }));
                                }
                            };
                        }
                        Some(_) => return self.current.replace(row).map(Ok),
                        // The first row has no previous group to flush.
                        None => self.current = Some(row),
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                // Input exhausted: flush the final pending group, if any.
                None => return self.current.take().map(Ok),
            }
        }
    }
}

/// Aggregates the sorted artifact at `input` into a new artifact at `output`.
pub fn aggregate_artifact(input: &Path, output: &Path) -> Result<AggregateStats> {
    let reader = ArtifactReader::open(input)?;
    let mut writer = ArtifactWriter::create(output)?;
    let mut progress = ProgressTracker::new("Aggregated records");

    let mut aggregator = RunAggregator::new(reader);
    for record in aggregator.by_ref() {
        writer.write_record(&record?)?;
        progress.add(1);
    }
    progress.log_final();

    let stats =
        AggregateStats { rows_read: aggregator.rows_read(), records_written: writer.finish()? };
    info!("Aggregated {} rows into {} records", stats.rows_read, stats.records_written);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CompositeKey;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn rec(key: &str, value: u64) -> KeyedRecord {
        KeyedRecord { key: key.to_string(), value }
    }

    fn aggregate(rows: Vec<KeyedRecord>) -> Result<Vec<KeyedRecord>> {
        RunAggregator::new(rows.into_iter().map(Ok)).collect()
    }

    #[test]
    fn test_apple_banana_scenario() -> Result<()> {
        let apple = CompositeKey::from_parts(["0", "Apple"]);
        let banana = CompositeKey::from_parts(["0", "Banana"]);
        let rows = vec![
            KeyedRecord::new(&apple, 3),
            KeyedRecord::new(&apple, 2),
            KeyedRecord::new(&banana, 5),
        ];
        assert_eq!(aggregate(rows)?, vec![rec("0::Apple", 5), rec("0::Banana", 5)]);
        Ok(())
    }

    #[test]
    fn test_empty_input_yields_nothing() -> Result<()> {
        assert!(aggregate(Vec::new())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_single_row_is_its_own_group() -> Result<()> {
        assert_eq!(aggregate(vec![rec("k", 7)])?, vec![rec("k", 7)]);
        Ok(())
    }

    #[test]
    fn test_final_run_is_flushed() -> Result<()> {
        let rows = vec![rec("a", 1), rec("b", 1), rec("b", 1), rec("b", 1)];
        assert_eq!(aggregate(rows)?, vec![rec("a", 1), rec("b", 3)]);
        Ok(())
    }

    #[test]
    fn test_unsorted_input_splits_groups() -> Result<()> {
        // Documented behaviour: ordering violations are not detected.
        let rows = vec![rec("a", 1), rec("b", 1), rec("a", 1)];
        assert_eq!(aggregate(rows)?, vec![rec("a", 1), rec("b", 1), rec("a", 1)]);
        Ok(())
    }

    #[test]
    fn test_overflow_is_reported() {
        let result = aggregate(vec![rec("a", u64::MAX), rec("a", 1)]);
        assert!(matches!(result, Err(WatchCountError::MeasureOverflow { .. })));
    }

    #[test]
    fn test_aggregate_artifact() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("sorted.tsv");
        let output = dir.path().join("aggregate.tsv");
        fs::write(&input, "0::Apple\t3\n0::Apple\t2\n0::Banana\t5\n")?;

        let stats = aggregate_artifact(&input, &output)?;
        assert_eq!(stats, AggregateStats { rows_read: 3, records_written: 2 });
        assert_eq!(fs::read_to_string(&output)?, "0::Apple\t5\n0::Banana\t5\n");
        Ok(())
    }

    #[test]
    fn test_aggregate_empty_artifact() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("sorted.tsv");
        let output = dir.path().join("aggregate.tsv");
        fs::write(&input, "")?;

        let stats = aggregate_artifact(&input, &output)?;
        assert_eq!(stats, AggregateStats::default());
        assert!(output.exists());
        assert_eq!(fs::read_to_string(&output)?, "");
        Ok(())
    }

    /// Sorted runs: distinct sorted keys, each with one or more measures.
    fn sorted_runs() -> impl Strategy<Value = Vec<(String, Vec<u64>)>> {
        let measures = prop::collection::vec(0u64..1_000, 1..6);
        prop::collection::btree_map("[a-z]{1,6}", measures, 0..20)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_one_record_per_key_with_summed_measure(runs in sorted_runs()) {
            let rows: Vec<KeyedRecord> = runs
                .iter()
                .flat_map(|(k, vs)| vs.iter().map(move |v| rec(k, *v)))
                .collect();
            let expected: Vec<KeyedRecord> =
                runs.iter().map(|(k, vs)| rec(k, vs.iter().sum())).collect();
            prop_assert_eq!(aggregate(rows).unwrap(), expected);
        }

        #[test]
        fn prop_permuting_within_runs_is_invisible(runs in sorted_runs(), seed in any::<u64>()) {
            let forward: Vec<KeyedRecord> = runs
                .iter()
                .flat_map(|(k, vs)| vs.iter().map(move |v| rec(k, *v)))
                .collect();
            let permuted: Vec<KeyedRecord> = runs
                .iter()
                .flat_map(|(k, vs)| {
                    let mut vs = vs.clone();
                    let len = vs.len();
                    vs.rotate_left(usize::try_from(seed).unwrap_or(0) % len);
                    vs.reverse();
                    vs.into_iter().map(move |v| rec(k, v))
                })
                .collect();
            prop_assert_eq!(aggregate(forward).unwrap(), aggregate(permuted).unwrap());
        }
    }
}
