//! Sorting through the external `sort` utility.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use super::{SortStats, Sorter, count_lines};
use crate::errors::{Result, WatchCountError};

/// Program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "sort";

/// Runs `sort -t '\t' -k1,1` under the C locale.
#[derive(Debug, Clone)]
pub struct SystemSorter {
    program: PathBuf,
    buffer_size: Option<usize>,
    temp_dir: Option<PathBuf>,
    threads: usize,
}

impl Default for SystemSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSorter {
    /// Creates a sorter running `sort` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            buffer_size: None,
            temp_dir: None,
            threads: 1,
        }
    }

    /// Sets the program to run.
    #[must_use]
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the main-memory buffer size in bytes (`-S`).
    #[must_use]
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = Some(bytes);
        self
    }

    /// Sets the directory for temporary files (`-T`).
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Sets the number of concurrent sorts (`--parallel`, only passed when > 1).
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Arguments passed to the program for one invocation.
    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-t".into(), "\t".into(), "-k1,1".into()];
        if let Some(bytes) = self.buffer_size {
            args.push("-S".into());
            args.push(format!("{}K", (bytes / 1024).max(1)).into());
        }
        if let Some(dir) = &self.temp_dir {
            args.push("-T".into());
            args.push(dir.as_os_str().to_owned());
        }
        if self.threads > 1 {
            args.push(format!("--parallel={}", self.threads).into());
        }
        args.push("-o".into());
        args.push(output.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }

    fn failure(&self, status: String, stderr: String) -> WatchCountError {
        WatchCountError::ExternalToolFailure {
            tool: self.program.display().to_string(),
            status,
            stderr,
        }
    }
}

impl Sorter for SystemSorter {
    fn name(&self) -> &'static str {
        "sort"
    }

    fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        let args = self.args(input, output);
        debug!("Running {} {:?}", self.program.display(), args);

        let result = Command::new(&self.program)
            .args(&args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| self.failure(format!("could not be started: {e}"), String::new()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            return Err(self.failure(result.status.to_string(), stderr));
        }

        let records = count_lines(output)?;
        info!("Sort complete: {} records processed", records);
        Ok(SortStats { total_records: records, output_records: records, chunks_written: 0 })
    }
}
