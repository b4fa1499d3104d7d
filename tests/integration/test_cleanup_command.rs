//! Integration tests for the `cleanup` command.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;
use watchcount_lib::artifact::ArtifactPaths;
use watchcount_lib::index::{OrderedIndex, PagePayload};

fn watchcount_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_watchcount"))
}

#[test]
fn test_cleanup_removes_every_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let paths = ArtifactPaths::in_dir(temp_dir.path());
    for path in paths.intermediates() {
        fs::write(path, "0::Apple\t1\n").unwrap();
    }
    let mut index = OrderedIndex::<PagePayload>::open(&paths.index).unwrap().memtable_entries(1);
    index.set("0::Apple", PagePayload::default()).unwrap();
    drop(index);
    let unrelated = temp_dir.path().join("notes.txt");
    fs::write(&unrelated, "keep me").unwrap();

    let status = Command::new(watchcount_binary_path())
        .args(["cleanup", "--work-dir"])
        .arg(temp_dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    for path in paths.intermediates() {
        assert!(!path.exists(), "{} should have been removed", path.display());
    }
    assert!(!paths.index.exists());
    assert!(unrelated.exists());
}

#[test]
fn test_cleanup_of_empty_work_dir_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let status = Command::new(watchcount_binary_path())
        .args(["cleanup", "--work-dir"])
        .arg(temp_dir.path().join("never-created"))
        .status()
        .unwrap();
    assert!(status.success());
}
