//! End-to-end library tests over SQLite fixtures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rstest::rstest;
use tempfile::TempDir;
use watchcount_lib::errors::WatchCountError;
use watchcount_lib::pipeline::{JoinStrategy, PipelineConfig, run_pipeline};
use watchcount_lib::sort::SorterKind;
use watchcount_lib::source::{Collection, MemorySource, SourceRow, SqliteSource};

use crate::helpers::{ALL_COUNTS, BACKED_COUNTS, create_wiki_db, standard_wiki_db};

fn config(dir: &Path, strategy: JoinStrategy, sorter: SorterKind) -> PipelineConfig {
    let mut config = PipelineConfig::new(dir.join("work"), dir.join("counts.tsv"));
    config.strategy = strategy;
    config.chunk_size = 3;
    config.sort.kind = sorter;
    config.sort.temp_dir = Some(dir.join("work"));
    config
}

#[rstest]
#[case::none(JoinStrategy::None, ALL_COUNTS)]
#[case::index(JoinStrategy::Index, BACKED_COUNTS)]
#[case::sort_merge(JoinStrategy::SortMerge, BACKED_COUNTS)]
fn test_sqlite_fixture(#[case] strategy: JoinStrategy, #[case] expected: &str) {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let config = config(temp_dir.path(), strategy, SorterKind::Merge);

    let mut source = SqliteSource::open(&db).unwrap();
    let metrics = run_pipeline(&config, &mut source).unwrap();

    assert_eq!(fs::read_to_string(&config.output).unwrap(), expected);
    assert_eq!(metrics.rows_extracted, metrics.rows_aggregated);
    assert_eq!(metrics.aggregate_records, 5);
    if strategy != JoinStrategy::None {
        assert_eq!(metrics.dangling_keys, 1);
        assert_eq!(metrics.backed_keys, 4);
    }
}

/// Deterministic spread of watches over 40 titles in three namespaces, with
/// pages for only some of them.
fn generated_db(path: &Path) -> BTreeMap<(i64, String), u64> {
    let titles: Vec<String> = (0..40).map(|i| format!("Title_{:02}", (i * 17) % 40)).collect();
    let watches: Vec<(i64, &str)> =
        (0..500).map(|i| ((i % 3) as i64, titles[(i * 7) % 40].as_str())).collect();
    let pages: Vec<(i64, &str, bool)> = titles
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 4 != 0)
        .flat_map(|(i, t)| [(0, t.as_str(), i % 5 == 0), (2, t.as_str(), false)])
        .collect();
    create_wiki_db(path, &watches, &pages);

    let mut counts = BTreeMap::new();
    for (ns, title) in &watches {
        *counts.entry((*ns, (*title).to_string())).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_index_and_sort_merge_agree() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("wiki.sqlite");
    let counts = generated_db(&db);

    let mut outputs = Vec::new();
    for (strategy, sorter) in [
        (JoinStrategy::Index, SorterKind::System),
        (JoinStrategy::SortMerge, SorterKind::System),
        (JoinStrategy::Index, SorterKind::Merge),
        (JoinStrategy::SortMerge, SorterKind::Merge),
    ] {
        let mut config = config(temp_dir.path(), strategy, sorter);
        config.chunk_size = 37;
        config.memtable_entries = 8;
        if sorter == SorterKind::Merge {
            config.sort.memory_limit = Some(256);
        }

        let mut source = SqliteSource::open(&db).unwrap();
        let metrics = run_pipeline(&config, &mut source).unwrap();
        assert_eq!(metrics.aggregate_records, counts.len() as u64);
        assert_eq!(metrics.backed_keys + metrics.dangling_keys, metrics.aggregate_records);
        outputs.push((fs::read_to_string(&config.output).unwrap(), metrics));
    }

    let (first, first_metrics) = &outputs[0];
    for (output, metrics) in &outputs[1..] {
        assert_eq!(output, first);
        assert_eq!(metrics.backed_keys, first_metrics.backed_keys);
        assert_eq!(metrics.dangling_keys, first_metrics.dangling_keys);
    }

    let total: u64 = first
        .lines()
        .map(|line| line.split('\t').next().unwrap().parse::<u64>().unwrap())
        .sum();
    assert!(total > 0);
    assert!(total < 500);
}

#[test]
fn test_counts_match_direct_grouping() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("wiki.sqlite");
    let counts = generated_db(&db);

    let mut config = config(temp_dir.path(), JoinStrategy::None, SorterKind::System);
    config.chunk_size = 11;
    let mut source = SqliteSource::open(&db).unwrap();
    run_pipeline(&config, &mut source).unwrap();

    let mut observed = BTreeMap::new();
    for line in fs::read_to_string(&config.output).unwrap().lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3);
        let key = (fields[1].parse::<i64>().unwrap(), fields[2].to_string());
        observed.insert(key, fields[0].parse::<u64>().unwrap());
    }
    assert_eq!(observed, counts);
}

#[test]
fn test_extraction_windows() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config(temp_dir.path(), JoinStrategy::None, SorterKind::Merge);
    config.chunk_size = 2;

    let mut source = MemorySource::new();
    for id in 1..=4 {
        source.insert(Collection::Watchlist, id, SourceRow::page(0, "Apple", 1));
    }
    run_pipeline(&config, &mut source).unwrap();

    let ranges: Vec<_> = source.queries().iter().map(|(_, r)| r.clone()).collect();
    assert_eq!(ranges, vec![1..3, 3..5, 5..7]);
    assert_eq!(fs::read_to_string(&config.output).unwrap(), "4\t0\tApple\n");
}

#[test]
fn test_rerun_replaces_previous_output() {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let config = config(temp_dir.path(), JoinStrategy::Index, SorterKind::Merge);

    for _ in 0..2 {
        let mut source = SqliteSource::open(&db).unwrap();
        run_pipeline(&config, &mut source).unwrap();
        assert_eq!(fs::read_to_string(&config.output).unwrap(), BACKED_COUNTS);
    }
}

#[test]
fn test_source_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), JoinStrategy::SortMerge, SorterKind::Merge);
    let mut source = MemorySource::new()
        .with_row(Collection::Watchlist, 1, SourceRow::page(0, "Apple", 1))
        .fail_at_query(1);

    let result = run_pipeline(&config, &mut source);
    assert!(matches!(result, Err(WatchCountError::SourceUnavailable { .. })));
    assert!(!config.output.exists());
}
