//! Ordered persistent index of canonical entities.
//!
//! A thin typed layer over a RocksDB database mapping encoded composite keys
//! to a fixed-width payload. Writes are buffered in a [`WriteBatch`] and
//! applied once the batch holds `memtable_entries` puts, before any lookup,
//! and on [`OrderedIndex::close`], which also flushes the memtables to disk.
//! A later [`OrderedIndex::open`] sees every `set` made before the close.
//! Dropping an index without closing it loses only its unapplied batch.
//!
//! # Example
//!
//! ```
//! use watchcount_lib::index::{OrderedIndex, PagePayload};
//!
//! # fn main() -> watchcount_lib::errors::Result<()> {
//! let dir = tempfile::TempDir::new().unwrap();
//! let path = dir.path().join("pages.idx");
//!
//! let mut index = OrderedIndex::<PagePayload>::open(&path)?;
//! index.set("0::Apple", PagePayload { is_redirect: false })?;
//! index.close()?;
//!
//! let mut index = OrderedIndex::<PagePayload>::open_read_only(&path)?;
//! assert_eq!(index.get("0::Apple")?, Some(PagePayload { is_redirect: false }));
//! assert_eq!(index.get("0::Cherry")?, None);
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rocksdb::{DB, IteratorMode, Options, WriteBatch};

use crate::artifact::{remove_artifact, remove_artifact_dir};
use crate::errors::{Result, WatchCountError};

/// Default number of buffered puts before a batch is written.
pub const DEFAULT_MEMTABLE_ENTRIES: usize = 1_000_000;

/// Fixed-width value stored next to each key.
pub trait Payload: Copy + 'static {
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// Appends exactly [`Payload::WIDTH`] bytes to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes a payload, or `None` if the bytes are not a valid encoding.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

/// Existence payload for a canonical page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagePayload {
    /// Whether the page is a redirect.
    pub is_redirect: bool,
}

impl PagePayload {
    /// Builds a payload from the source's redirect flag (non-zero is a redirect).
    #[must_use]
    pub fn from_flag(flag: u64) -> Self {
        Self { is_redirect: flag != 0 }
    }
}

impl Payload for PagePayload {
    const WIDTH: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.is_redirect));
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0] => Some(Self { is_redirect: false }),
            [1] => Some(Self { is_redirect: true }),
            _ => None,
        }
    }
}

/// Counters describing a closed index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// `set` calls made through this handle.
    pub sets: u64,
    /// Write batches applied through this handle.
    pub spills: usize,
    /// Distinct keys in the index after close.
    pub entries: u64,
}

/// Disk-backed sorted key to payload store.
pub struct OrderedIndex<P: Payload> {
    path: PathBuf,
    db: DB,
    read_only: bool,
    batch: WriteBatch,
    memtable_limit: usize,
    sets: u64,
    spills: usize,
    _payload: PhantomData<P>,
}

impl<P: Payload> OrderedIndex<P> {
    /// Opens the index at `path` for reading and writing, creating an empty
    /// one if absent.
    ///
    /// # Errors
    ///
    /// Returns `IndexUnavailable` if the path cannot be accessed or does not
    /// hold a valid index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(unavailable(path))?;
        debug!("Opened index {}", path.display());
        Ok(Self::from_db(path, db, false))
    }

    /// Opens an existing index for lookups only.
    ///
    /// # Errors
    ///
    /// Returns `IndexUnavailable` if the index does not exist or is corrupt.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(WatchCountError::index(path, "index does not exist"));
        }
        let db = DB::open_for_read_only(&Options::default(), path, false)
            .map_err(unavailable(path))?;
        Ok(Self::from_db(path, db, true))
    }

    fn from_db(path: &Path, db: DB, read_only: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            db,
            read_only,
            batch: WriteBatch::default(),
            memtable_limit: DEFAULT_MEMTABLE_ENTRIES,
            sets: 0,
            spills: 0,
            _payload: PhantomData,
        }
    }

    /// Sets the number of buffered puts that triggers a batch write (at least 1).
    #[must_use]
    pub fn memtable_entries(mut self, limit: usize) -> Self {
        self.memtable_limit = limit.max(1);
        self
    }

    /// Path of the index directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or overwrites the payload for `key`.
    pub fn set(&mut self, key: &str, payload: P) -> Result<()> {
        if self.read_only {
            return Err(WatchCountError::index(&self.path, "index is open read-only"));
        }
        let mut value = Vec::with_capacity(P::WIDTH);
        payload.encode(&mut value);
        self.batch.put(key.as_bytes(), &value);
        self.sets += 1;
        if self.batch.len() >= self.memtable_limit {
            self.write_batch()?;
        }
        Ok(())
    }

    /// Returns the newest payload for `key`, if any.
    pub fn get(&mut self, key: &str) -> Result<Option<P>> {
        self.write_batch()?;
        let Some(bytes) = self.db.get(key.as_bytes()).map_err(unavailable(&self.path))? else {
            return Ok(None);
        };
        P::decode(&bytes).map(Some).ok_or_else(|| {
            WatchCountError::index(&self.path, format!("invalid payload for key {key:?}"))
        })
    }

    /// Applies pending writes, flushes them to disk and releases the handle.
    pub fn close(mut self) -> Result<IndexStats> {
        self.write_batch()?;
        if !self.read_only {
            self.db.flush().map_err(unavailable(&self.path))?;
        }
        let mut entries = 0;
        for item in self.db.iterator(IteratorMode::Start) {
            item.map_err(unavailable(&self.path))?;
            entries += 1;
        }

        info!(
            "Closed index {} with {} entries ({} batches)",
            self.path.display(),
            entries,
            self.spills
        );
        Ok(IndexStats { sets: self.sets, spills: self.spills, entries })
    }

    fn write_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let puts = batch.len();
        self.db.write(batch).map_err(unavailable(&self.path))?;
        self.spills += 1;
        debug!("Wrote {} index entries to {}", puts, self.path.display());
        Ok(())
    }
}

/// Maps a RocksDB error on the index at `path` to `IndexUnavailable`.
fn unavailable(path: &Path) -> impl Fn(rocksdb::Error) -> WatchCountError + '_ {
    move |err| WatchCountError::index(path, err.to_string())
}

/// Removes the index at `path`.
///
/// A missing index is ignored. Returns the number of paths removed.
pub fn remove_index(path: &Path) -> Result<usize> {
    if path.is_dir() {
        return Ok(usize::from(remove_artifact_dir(path)?));
    }
    Ok(usize::from(remove_artifact(path)?))
}
