//! Read boundary over the relational source store.
//!
//! The pipeline only ever asks the source for rows whose primary key falls in
//! a bounded, half-open range. Implementations must return rows ordered by the
//! grouping key within the range; they never see offset/limit pagination and
//! never scan without bounds.
//!
//! - [`SqliteSource`] - a MediaWiki-shaped SQLite database
//! - [`MemorySource`] - in-memory rows, recording every range asked for

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::ops::Range;

use crate::errors::Result;
use crate::key::CompositeKey;

pub use memory::MemorySource;
pub use sqlite::SqliteSource;

/// The logical collections the pipeline extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Watch relationships; the value is the watcher count within a chunk.
    Watchlist,
    /// Canonical entities (pages); the value is the redirect flag.
    Pages,
}

impl Collection {
    /// Stable lowercase name used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Pages => "pages",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row as returned by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Key parts in order, e.g. `[namespace, title]`.
    pub parts: Vec<String>,
    /// Measure (watch rows) or existence payload (entity rows).
    pub value: u64,
}

impl SourceRow {
    /// Convenience constructor for `(namespace, title, value)` rows.
    #[must_use]
    pub fn page(namespace: i64, title: &str, value: u64) -> Self {
        Self { parts: vec![namespace.to_string(), title.to_string()], value }
    }

    /// The row's composite key.
    #[must_use]
    pub fn key(&self) -> CompositeKey {
        CompositeKey::from_parts(&self.parts)
    }
}

/// Range-bounded, ordered read access to the source store.
pub trait RowSource {
    /// Returns every row of `collection` whose primary key lies in `range`,
    /// ordered by the grouping key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::errors::WatchCountError::SourceUnavailable`] when the
    /// store cannot answer the query.
    fn fetch(&mut self, collection: Collection, range: Range<u64>) -> Result<Vec<SourceRow>>;
}
