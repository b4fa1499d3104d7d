//! Intermediate artifact files and their lifecycle.
//!
//! Every stage hands data to the next through a tab-delimited artifact: one
//! record per line, no quoting, keys escaped by [`crate::key`]. An artifact is
//! written by exactly one producer, read once by one consumer and then removed
//! by the orchestrator. Removing an artifact that does not exist is a no-op so
//! that re-runs and `cleanup` are idempotent.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{IoContext, Result, WatchCountError};
use crate::key::{CompositeKey, escape_output_field};

/// Buffer size for artifact readers and writers.
pub const IO_BUFFER_SIZE: usize = 256 * 1024;

/// A `key\tvalue` artifact line.
///
/// The value is the measure for watch rows and aggregates, and the existence
/// payload (redirect flag) for canonical entity rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedRecord {
    /// Encoded composite key (leading, sort column).
    pub key: String,
    /// Measure or payload.
    pub value: u64,
}

impl KeyedRecord {
    /// Creates a record from a key and value.
    #[must_use]
    pub fn new(key: &CompositeKey, value: u64) -> Self {
        Self { key: key.as_str().to_string(), value }
    }
}

/// Streaming reader over a [`KeyedRecord`] artifact.
pub struct ArtifactReader {
    path: PathBuf,
    reader: csv::Reader<BufReader<File>>,
    record: StringRecord,
}

impl ArtifactReader {
    /// Opens an artifact for reading.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .io_context(|| format!("Failed to open artifact {}", path.display()))?;
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(false)
            .from_reader(BufReader::with_capacity(IO_BUFFER_SIZE, file));
        Ok(Self { path: path.to_path_buf(), reader, record: StringRecord::new() })
    }

    /// Path of the artifact being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<KeyedRecord>> {
        let more = self.reader.read_record(&mut self.record).map_err(|e| {
            let line = e.position().map_or(0, csv::Position::line);
            WatchCountError::MalformedRecord {
                path: self.path.clone(),
                line,
                reason: e.to_string(),
            }
        })?;
        if !more {
            return Ok(None);
        }

        let line = self.record.position().map_or(0, csv::Position::line);
        if self.record.len() != 2 {
            return Err(WatchCountError::MalformedRecord {
                path: self.path.clone(),
                line,
                reason: format!("expected 2 fields, found {}", self.record.len()),
            });
        }
        let record: KeyedRecord =
            self.record.deserialize(None).map_err(|e| WatchCountError::MalformedRecord {
                path: self.path.clone(),
                line,
                reason: e.to_string(),
            })?;
        Ok(Some(record))
    }
}

impl Iterator for ArtifactReader {
    type Item = Result<KeyedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Writer producing tab-delimited artifact lines.
pub struct ArtifactWriter {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    written: u64,
}

impl ArtifactWriter {
    /// Creates (or truncates) an artifact.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .io_context(|| format!("Failed to create artifact {}", path.display()))?;
        Ok(Self::from_file(path, file))
    }

    /// Opens an artifact for appending, creating it if absent.
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .io_context(|| format!("Failed to open artifact {} for append", path.display()))?;
        Ok(Self::from_file(path, file))
    }

    fn from_file(path: &Path, file: File) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_writer(BufWriter::with_capacity(IO_BUFFER_SIZE, file));
        Self { path: path.to_path_buf(), writer, written: 0 }
    }

    /// Writes one `key\tvalue` record.
    pub fn write_record(&mut self, record: &KeyedRecord) -> Result<()> {
        self.writer.serialize(record).map_err(|e| self.csv_error(e))?;
        self.written += 1;
        Ok(())
    }

    /// Writes one final output line: `measure\tpart1\tpart2...`.
    ///
    /// Parts are written as stored, except that tab, LF and CR are escaped so
    /// a title holding one cannot shift columns or split the line.
    pub fn write_output(&mut self, measure: u64, parts: &[String]) -> Result<()> {
        let mut fields = Vec::with_capacity(parts.len() + 1);
        fields.push(measure.to_string());
        fields.extend(parts.iter().map(|p| escape_output_field(p)));
        self.writer.write_record(&fields).map_err(|e| self.csv_error(e))?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written through this writer.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and closes the artifact.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .io_context(|| format!("Failed to flush artifact {}", self.path.display()))?;
        Ok(self.written)
    }

    fn csv_error(&self, e: csv::Error) -> WatchCountError {
        let context = format!("Failed to write artifact {}", self.path.display());
        match e.into_kind() {
            csv::ErrorKind::Io(source) => WatchCountError::io(context, source),
            other => WatchCountError::io(context, io::Error::other(format!("{other:?}"))),
        }
    }
}

/// Removes an artifact, treating a missing file as already removed.
///
/// Returns `true` if a file was actually deleted.
pub fn remove_artifact(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WatchCountError::io(format!("Failed to remove {}", path.display()), e)),
    }
}

/// Removes a directory tree, treating a missing directory as already removed.
pub fn remove_artifact_dir(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WatchCountError::io(format!("Failed to remove {}", path.display()), e)),
    }
}

/// Path table for every artifact a run produces inside its work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Raw watch rows in extraction order.
    pub watch_raw: PathBuf,
    /// Watch rows sorted by key.
    pub watch_sorted: PathBuf,
    /// One record per distinct watched key.
    pub aggregate: PathBuf,
    /// Canonical entity rows in extraction order.
    pub pages_raw: PathBuf,
    /// Canonical entity rows sorted by key.
    pub pages_sorted: PathBuf,
    /// Ordered persistent index of canonical entities.
    pub index: PathBuf,
}

impl ArtifactPaths {
    /// Derives the path table for a work directory.
    #[must_use]
    pub fn in_dir(work_dir: &Path) -> Self {
        Self {
            watch_raw: work_dir.join("watchlist.raw.tsv"),
            watch_sorted: work_dir.join("watchlist.sorted.tsv"),
            aggregate: work_dir.join("watchlist.aggregate.tsv"),
            pages_raw: work_dir.join("pages.raw.tsv"),
            pages_sorted: work_dir.join("pages.sorted.tsv"),
            index: work_dir.join("pages.idx"),
        }
    }

    /// The intermediate TSV artifacts, in production order.
    #[must_use]
    pub fn intermediates(&self) -> [&Path; 5] {
        [&self.watch_raw, &self.watch_sorted, &self.aggregate, &self.pages_raw, &self.pages_sorted]
    }

    /// Removes every artifact of a prior run, including the index directory.
    /// Returns the number of paths actually removed.
    pub fn remove_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.intermediates() {
            removed += usize::from(remove_artifact(path)?);
        }
        removed += crate::index::remove_index(&self.index)?;
        Ok(removed)
    }
}
