//! Integration tests for the `verify` command.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

fn watchcount_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_watchcount"))
}

#[test]
fn test_verify_sorted_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sorted.tsv");
    fs::write(&path, "0::Apple\t3\n0::Apple\t2\n0::Banana\t5\n1::Apple\t1\n").unwrap();

    let output =
        Command::new(watchcount_binary_path()).args(["verify", "--input"]).arg(&path).output();
    let output = output.unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_verify_reports_first_violation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("unsorted.tsv");
    fs::write(&path, "0::Apple\t3\n0::Cherry\t2\n0::Banana\t5\n0::Apple\t1\n").unwrap();

    let output = Command::new(watchcount_binary_path())
        .env("RUST_LOG", "info")
        .args(["verify", "--input"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("First violation at line 3: key 0::Banana"), "{stderr}");
    assert!(stderr.contains("2 of 4 records out of order"), "{stderr}");
}
