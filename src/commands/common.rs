//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;

use clap::Args;

use watchcount_lib::sort::system::DEFAULT_PROGRAM;
use watchcount_lib::sort::{SortSettings, SorterKind};

/// Location of a run's intermediate artifacts.
#[derive(Debug, Clone, Args)]
pub struct WorkDirOptions {
    /// Directory holding intermediate artifacts and the index
    #[arg(short = 'w', long = "work-dir")]
    pub work_dir: PathBuf,
}

/// Sorter selection and resources.
#[derive(Debug, Clone, Args)]
pub struct SortOptions {
    /// Sorter implementation
    #[arg(long = "sorter", value_enum, default_value = "system")]
    pub sorter: SorterKind,

    /// Program run by the system sorter
    #[arg(long = "sort-program", default_value = DEFAULT_PROGRAM)]
    pub sort_program: PathBuf,

    /// Memory budget for sorting (e.g. "512M", "1G").
    ///
    /// Passed as the buffer size to the system sorter, or used as the
    /// in-memory chunk limit by the merge sorter before spilling to disk.
    #[arg(short = 'm', long = "max-memory", value_parser = parse_memory)]
    pub max_memory: Option<usize>,

    /// Temporary directory for sort spill files.
    ///
    /// If not specified, the work directory is used.
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Option<PathBuf>,

    /// Number of threads used by the sorter
    #[arg(short = 't', long = "threads", default_value = "1")]
    pub threads: usize,
}

impl SortOptions {
    /// Builds library sort settings, spilling to `work_dir` unless a
    /// temporary directory was given.
    #[must_use]
    pub fn settings(&self, work_dir: &std::path::Path) -> SortSettings {
        SortSettings {
            kind: self.sorter,
            program: self.sort_program.clone(),
            memory_limit: self.max_memory,
            temp_dir: Some(self.tmp_dir.clone().unwrap_or_else(|| work_dir.to_path_buf())),
            threads: self.threads,
        }
    }

    /// A one-line description for logging.
    #[must_use]
    pub fn log_message(&self) -> String {
        let memory = self
            .max_memory
            .map_or_else(|| "default".to_string(), |m| format!("{} MB", m / (1024 * 1024)));
        match self.sorter {
            SorterKind::System => format!(
                "system sort ({}), memory: {memory}, threads: {}",
                self.sort_program.display(),
                self.threads
            ),
            SorterKind::Merge => {
                format!("merge sort, memory: {memory}, threads: {}", self.threads)
            }
        }
    }
}

/// Parse memory size string (e.g., "512M", "1G", "2G").
pub fn parse_memory(s: &str) -> Result<usize, String> {
    let s = s.trim().to_uppercase();

    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('G') {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('K') {
        (num, 1024)
    } else {
        // Assume bytes
        (s.as_str(), 1)
    };

    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    if num <= 0.0 {
        return Err("Memory size must be positive".to_string());
    }

    Ok((num * f64::from(multiplier)) as usize)
}
