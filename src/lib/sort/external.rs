//! In-process external merge sort for line-oriented artifacts.
//!
//! # Algorithm
//!
//! 1. **Accumulate phase**: Read lines into memory until the limit is reached
//! 2. **Sort phase**: Sort the chunk, in a dedicated rayon pool when threads > 1
//! 3. **Spill phase**: Write the sorted chunk to a temp file
//! 4. **Merge phase**: K-way merge of the chunk files using a binary heap
//!
//! Inputs that fit within the memory limit skip the spill and merge phases.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use rayon::ThreadPool;
use rayon::prelude::*;
use tempfile::TempDir;

use super::{SortStats, Sorter, compare_lines};
use crate::artifact::IO_BUFFER_SIZE;
use crate::errors::{IoContext, Result, WatchCountError};

/// Default memory limit per chunk (512 MB).
const DEFAULT_MEMORY_LIMIT: usize = 512 * 1024 * 1024;

/// Estimated per-line overhead on top of the line bytes (the `Vec` header
/// plus allocator slack).
const LINE_OVERHEAD: usize = 32;

/// Buffer size for reading temp files during merge.
const MERGE_BUFFER_SIZE: usize = 64 * 1024;

/// External merge sorter for tab-delimited artifacts.
#[derive(Debug, Clone)]
pub struct MergeSorter {
    /// Maximum memory to use for in-memory sorting.
    memory_limit: usize,
    /// Temporary directory for spill files.
    temp_dir: Option<PathBuf>,
    /// Number of threads for the in-memory sort.
    threads: usize,
}

impl Default for MergeSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeSorter {
    /// Create a new sorter with the default memory limit and one thread.
    #[must_use]
    pub fn new() -> Self {
        Self { memory_limit: DEFAULT_MEMORY_LIMIT, temp_dir: None, threads: 1 }
    }

    /// Set the memory limit for in-memory sorting.
    #[must_use]
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the temporary directory for spill files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.temp_dir = Some(path);
        self
    }

    /// Set the number of threads.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Builds the pool used for in-memory sorts, or `None` for a single thread.
    fn thread_pool(&self) -> Result<Option<ThreadPool>> {
        if self.threads <= 1 {
            return Ok(None);
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.threads).build().map_err(
            |e| WatchCountError::InvalidParameter {
                parameter: "threads".to_string(),
                reason: format!("cannot build a pool of {} threads: {e}", self.threads),
            },
        )?;
        Ok(Some(pool))
    }

    /// Sort lines in place by leading key.
    fn sort_lines(pool: Option<&ThreadPool>, lines: &mut [Vec<u8>]) {
        match pool {
            Some(pool) => pool.install(|| lines.par_sort_unstable_by(|a, b| compare_lines(a, b))),
            None => lines.sort_unstable_by(|a, b| compare_lines(a, b)),
        }
    }

    /// Sort lines and write them to `path`.
    fn sort_and_write(
        pool: Option<&ThreadPool>,
        lines: &mut [Vec<u8>],
        path: &Path,
    ) -> Result<()> {
        Self::sort_lines(pool, lines);
        let mut writer = create_writer(path)?;
        for line in lines.iter() {
            write_line(&mut writer, line, path)?;
        }
        writer.flush().io_context(|| format!("Failed to flush {}", path.display()))
    }

    /// K-way merge of sorted chunk files into `output`.
    fn merge_chunks(&self, chunk_files: &[PathBuf], output: &Path) -> Result<u64> {
        let mut chunk_readers: Vec<ChunkReader> = chunk_files
            .iter()
            .enumerate()
            .map(|(idx, path)| ChunkReader::new(path, idx))
            .collect::<Result<Vec<_>>>()?;

        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(chunk_files.len());
        for reader in &mut chunk_readers {
            if let Some(line) = reader.next_line()? {
                heap.push(Reverse(HeapEntry { line, chunk_idx: reader.idx }));
            }
        }

        let mut writer = create_writer(output)?;
        let mut merged = 0u64;
        while let Some(Reverse(entry)) = heap.pop() {
            write_line(&mut writer, &entry.line, output)?;
            merged += 1;

            let reader = &mut chunk_readers[entry.chunk_idx];
            if let Some(line) = reader.next_line()? {
                heap.push(Reverse(HeapEntry { line, chunk_idx: reader.idx }));
            }
        }
        writer.flush().io_context(|| format!("Failed to flush {}", output.display()))?;

        info!("Merge complete: {} records merged", merged);
        Ok(merged)
    }

    /// Create temporary directory for spill files.
    fn create_temp_dir(&self) -> Result<TempDir> {
        match &self.temp_dir {
            Some(base) => {
                fs::create_dir_all(base)
                    .io_context(|| format!("Failed to create {}", base.display()))?;
                TempDir::new_in(base).io_context(|| "Failed to create temp directory")
            }
            None => TempDir::new().io_context(|| "Failed to create temp directory"),
        }
    }
}

impl Sorter for MergeSorter {
    fn name(&self) -> &'static str {
        "merge-sort"
    }

    fn sort(&self, input: &Path, output: &Path) -> Result<SortStats> {
        info!("Memory limit: {} MB", self.memory_limit / (1024 * 1024));
        info!("Threads: {}", self.threads);

        let file =
            File::open(input).io_context(|| format!("Failed to open {}", input.display()))?;
        let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, file);

        let pool = self.thread_pool()?;
        let temp_dir = self.create_temp_dir()?;
        let mut stats = SortStats::default();
        let mut chunk_files: Vec<PathBuf> = Vec::new();
        let mut lines: Vec<Vec<u8>> = Vec::new();
        let mut memory_used = 0usize;

        // Phase 1: Read and sort chunks
        loop {
            let mut line = Vec::new();
            let n = reader
                .read_until(b'\n', &mut line)
                .io_context(|| format!("Failed to read {}", input.display()))?;
            if n == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            stats.total_records += 1;
            memory_used += line.len() + LINE_OVERHEAD;
            lines.push(line);

            if memory_used >= self.memory_limit {
                let chunk_path =
                    temp_dir.path().join(format!("chunk_{:04}.tsv", chunk_files.len()));
                Self::sort_and_write(pool.as_ref(), &mut lines, &chunk_path)?;
                stats.chunks_written += 1;
                chunk_files.push(chunk_path);
                lines.clear();
                memory_used = 0;
            }
        }

        // Phase 2: Handle remaining lines
        if chunk_files.is_empty() {
            info!("All records fit in memory, performing in-memory sort");
            Self::sort_and_write(pool.as_ref(), &mut lines, output)?;
            stats.output_records = lines.len() as u64;
        } else {
            if !lines.is_empty() {
                let chunk_path =
                    temp_dir.path().join(format!("chunk_{:04}.tsv", chunk_files.len()));
                Self::sort_and_write(pool.as_ref(), &mut lines, &chunk_path)?;
                stats.chunks_written += 1;
                chunk_files.push(chunk_path);
            }
            drop(lines);

            // Phase 3: K-way merge
            info!("Merging {} chunks...", chunk_files.len());
            stats.output_records = self.merge_chunks(&chunk_files, output)?;
        }

        info!("Sort complete: {} records processed", stats.total_records);
        Ok(stats)
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).io_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::with_capacity(IO_BUFFER_SIZE, file))
}

fn write_line(writer: &mut BufWriter<File>, line: &[u8], path: &Path) -> Result<()> {
    writer
        .write_all(line)
        .and_then(|()| writer.write_all(b"\n"))
        .io_context(|| format!("Failed to write {}", path.display()))
}

/// Reader for a sorted chunk file.
struct ChunkReader {
    path: PathBuf,
    reader: BufReader<File>,
    idx: usize,
}

impl ChunkReader {
    fn new(path: &Path, idx: usize) -> Result<Self> {
        let file = File::open(path).io_context(|| "Failed to open chunk file")?;
        let reader = BufReader::with_capacity(MERGE_BUFFER_SIZE, file);
        Ok(Self { path: path.to_path_buf(), reader, idx })
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut line)
            .io_context(|| format!("Failed to read chunk {}", self.path.display()))?;
        if n == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Entry in the merge heap.
struct HeapEntry {
    line: Vec<u8>,
    chunk_idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lines(&self.line, &other.line).then(self.chunk_idx.cmp(&other.chunk_idx))
    }
}
