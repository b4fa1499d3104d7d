//! Integration tests for the `run` command.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rstest::rstest;
use tempfile::TempDir;
use watchcount_lib::artifact::ArtifactPaths;

use crate::helpers::{ALL_COUNTS, BACKED_COUNTS, standard_wiki_db};

fn watchcount_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_watchcount"))
}

fn run_command(db: &Path, work: &Path, output: &Path, extra: &[&str]) -> Output {
    Command::new(watchcount_binary_path())
        .arg("run")
        .arg("--source")
        .arg(db)
        .arg("--work-dir")
        .arg(work)
        .arg("--output")
        .arg(output)
        .args(extra)
        .output()
        .expect("Failed to run watchcount")
}

fn assert_no_artifacts(work: &Path) {
    let paths = ArtifactPaths::in_dir(work);
    for path in paths.intermediates() {
        assert!(!path.exists(), "{} should have been removed", path.display());
    }
    assert!(!paths.index.exists(), "index should have been removed");
}

#[rstest]
#[case::none("none", "system", ALL_COUNTS)]
#[case::index("index", "system", BACKED_COUNTS)]
#[case::sort_merge("sort-merge", "system", BACKED_COUNTS)]
#[case::none_merge_sorter("none", "merge", ALL_COUNTS)]
#[case::index_merge_sorter("index", "merge", BACKED_COUNTS)]
#[case::sort_merge_merge_sorter("sort-merge", "merge", BACKED_COUNTS)]
fn test_run_strategies(#[case] strategy: &str, #[case] sorter: &str, #[case] expected: &str) {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("counts.tsv");

    let result = run_command(
        &db,
        &work,
        &output,
        &["--chunk-size", "3", "--strategy", strategy, "--sorter", sorter],
    );
    assert!(result.status.success(), "run failed: {}", String::from_utf8_lossy(&result.stderr));

    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    assert_no_artifacts(&work);
}

#[rstest]
#[case::index("index")]
#[case::sort_merge("sort-merge")]
fn test_run_keep_dangling(#[case] strategy: &str) {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("counts.tsv");

    let result = run_command(
        &db,
        &work,
        &output,
        &["--chunk-size", "2", "--strategy", strategy, "--keep-dangling"],
    );
    assert!(result.status.success(), "run failed: {}", String::from_utf8_lossy(&result.stderr));
    assert_eq!(fs::read_to_string(&output).unwrap(), ALL_COUNTS);
}

#[test]
fn test_run_writes_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let work = temp_dir.path().join("work");
    let output = temp_dir.path().join("counts.tsv");
    let metrics = temp_dir.path().join("metrics.tsv");

    let metrics_arg = metrics.to_string_lossy().into_owned();
    let result = run_command(
        &db,
        &work,
        &output,
        &[
            "--chunk-size",
            "3",
            "--strategy",
            "index",
            "--index-memtable-entries",
            "2",
            "--metrics",
            &metrics_arg,
        ],
    );
    assert!(result.status.success(), "run failed: {}", String::from_utf8_lossy(&result.stderr));

    let contents = fs::read_to_string(&metrics).unwrap();
    let mut lines = contents.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let values: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert!(lines.next().is_none());

    let column = |name: &str| -> &str {
        let idx = header.iter().position(|h| *h == name).unwrap();
        values[idx]
    };
    assert_eq!(column("strategy"), "index");
    assert_eq!(column("chunk_size"), "3");
    assert_eq!(column("aggregate_records"), "5");
    assert_eq!(column("entities_extracted"), "5");
    assert_eq!(column("backed_keys"), "4");
    assert_eq!(column("dangling_keys"), "1");
    assert_eq!(column("output_records"), "4");
    assert!((column("dangling_fraction").parse::<f64>().unwrap() - 0.2).abs() < 1e-9);
}

#[test]
fn test_run_missing_source_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("counts.tsv");

    let result = run_command(
        &temp_dir.path().join("missing.sqlite"),
        &temp_dir.path().join("work"),
        &output,
        &[],
    );
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Source database"));
    assert!(!output.exists());
}

#[test]
fn test_run_failing_sort_program_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let output = temp_dir.path().join("counts.tsv");

    let result = run_command(
        &db,
        &temp_dir.path().join("work"),
        &output,
        &["--sort-program", "false"],
    );
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("false"));
    assert!(!output.exists());
}

#[test]
fn test_run_rejects_zero_chunk_size() {
    let temp_dir = TempDir::new().unwrap();
    let db = standard_wiki_db(temp_dir.path());
    let output = temp_dir.path().join("counts.tsv");

    let result = run_command(
        &db,
        &temp_dir.path().join("work"),
        &output,
        &["--chunk-size", "0"],
    );
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("chunk-size"));
}
