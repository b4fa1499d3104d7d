//! Total ordering of artifacts by their leading key column.
//!
//! Every sorter produces the same order: lines compared byte-wise by their
//! first tab-delimited field (the encoded composite key), ties broken by the
//! rest of the line. This is what `LC_ALL=C sort -t '\t' -k1,1` produces, so
//! the two implementations are interchangeable:
//!
//! - [`SystemSorter`] delegates to the external `sort` utility and checks its
//!   exit status.
//! - [`MergeSorter`] is an in-process external merge sort: accumulate lines
//!   up to a memory limit, sort them (in parallel with rayon when asked),
//!   spill sorted chunks to a temporary directory and k-way merge them.

pub mod external;
pub mod system;

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::info;

use crate::artifact::IO_BUFFER_SIZE;
use crate::errors::{IoContext, Result};

pub use external::MergeSorter;
pub use system::SystemSorter;

/// Statistics from a sort operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Total records read from input.
    pub total_records: u64,
    /// Records written to output.
    pub output_records: u64,
    /// Number of temporary chunk files written.
    pub chunks_written: usize,
}

/// A facility that totally orders an artifact.
pub trait Sorter {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Sorts the lines of `input` into `output`.
    ///
    /// `output` is created or truncated; `input` is left untouched.
    fn sort(&self, input: &Path, output: &Path) -> Result<SortStats>;
}

/// Which sorter implementation a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SorterKind {
    /// The external `sort` utility.
    #[default]
    System,
    /// The in-process merge sort.
    Merge,
}

/// Settings shared by both sorter implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSettings {
    /// Implementation to use.
    pub kind: SorterKind,
    /// Program to run for [`SorterKind::System`].
    pub program: PathBuf,
    /// Memory budget in bytes (sort buffer or chunk size).
    pub memory_limit: Option<usize>,
    /// Directory for temporary files.
    pub temp_dir: Option<PathBuf>,
    /// Worker threads.
    pub threads: usize,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            kind: SorterKind::System,
            program: PathBuf::from(system::DEFAULT_PROGRAM),
            memory_limit: None,
            temp_dir: None,
            threads: 1,
        }
    }
}

impl SortSettings {
    /// Builds the configured sorter.
    #[must_use]
    pub fn build(&self) -> Box<dyn Sorter> {
        match self.kind {
            SorterKind::System => {
                let mut sorter = SystemSorter::new().program(&self.program).threads(self.threads);
                if let Some(limit) = self.memory_limit {
                    sorter = sorter.buffer_size(limit);
                }
                if let Some(dir) = &self.temp_dir {
                    sorter = sorter.temp_dir(dir.clone());
                }
                Box::new(sorter)
            }
            SorterKind::Merge => {
                let mut sorter = MergeSorter::new().threads(self.threads);
                if let Some(limit) = self.memory_limit {
                    sorter = sorter.memory_limit(limit);
                }
                if let Some(dir) = &self.temp_dir {
                    sorter = sorter.temp_dir(dir.clone());
                }
                Box::new(sorter)
            }
        }
    }
}

/// The leading tab-delimited field of a line.
#[must_use]
pub fn leading_field(line: &[u8]) -> &[u8] {
    line.iter().position(|&b| b == b'\t').map_or(line, |i| &line[..i])
}

/// Compares two lines by leading field, then by the whole line.
#[must_use]
pub fn compare_lines(a: &[u8], b: &[u8]) -> Ordering {
    leading_field(a).cmp(leading_field(b)).then_with(|| a.cmp(b))
}

/// Outcome of checking an artifact's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderCheck {
    /// Lines read.
    pub records: u64,
    /// Lines whose leading key is smaller than the previous line's.
    pub violations: u64,
    /// 1-based line number and key of the first violation.
    pub first_violation: Option<(u64, String)>,
}

impl OrderCheck {
    /// Whether the artifact is sorted.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.violations == 0
    }
}

/// Checks that `path` is ordered by its leading key column.
pub fn check_order(path: &Path) -> Result<OrderCheck> {
    let file = File::open(path).io_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);

    let mut check = OrderCheck::default();
    let mut previous: Vec<u8> = Vec::new();
    let mut line: Vec<u8> = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .io_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        check.records += 1;

        let key = leading_field(&line);
        if check.records > 1 && key < previous.as_slice() {
            check.violations += 1;
            if check.first_violation.is_none() {
                let key = String::from_utf8_lossy(key).into_owned();
                check.first_violation = Some((check.records, key));
            }
        }
        previous.clear();
        previous.extend_from_slice(key);
    }

    info!("Checked {} records: {} order violations", check.records, check.violations);
    Ok(check)
}

/// Counts the lines of a file.
pub(crate) fn count_lines(path: &Path) -> Result<u64> {
    let file = File::open(path).io_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);
    let mut count = 0;
    let mut line = Vec::new();
    while reader
        .read_until(b'\n', &mut line)
        .io_context(|| format!("Failed to read {}", path.display()))?
        > 0
    {
        count += 1;
        line.clear();
    }
    Ok(count)
}
