//! In-memory row source for tests and small fixtures.

use std::collections::BTreeMap;
use std::ops::Range;

use super::{Collection, RowSource, SourceRow};
use crate::errors::{Result, WatchCountError};

/// Rows held in memory, keyed by primary key, per collection.
///
/// Every range passed to [`RowSource::fetch`] is recorded so callers can assert
/// on the exact sequence of bounded queries. A failure can be injected at a
/// given query number to exercise mid-run source outages.
#[derive(Debug, Default)]
pub struct MemorySource {
    watchlist: BTreeMap<u64, SourceRow>,
    pages: BTreeMap<u64, SourceRow>,
    queries: Vec<(Collection, Range<u64>)>,
    fail_at_query: Option<usize>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row under primary key `id`.
    pub fn insert(&mut self, collection: Collection, id: u64, row: SourceRow) {
        self.table_mut(collection).insert(id, row);
    }

    /// Builder-style [`MemorySource::insert`].
    #[must_use]
    pub fn with_row(mut self, collection: Collection, id: u64, row: SourceRow) -> Self {
        self.insert(collection, id, row);
        self
    }

    /// Makes the `n`th query (0-based) fail with `SourceUnavailable`.
    #[must_use]
    pub fn fail_at_query(mut self, n: usize) -> Self {
        self.fail_at_query = Some(n);
        self
    }

    /// Every query issued so far, in order.
    #[must_use]
    pub fn queries(&self) -> &[(Collection, Range<u64>)] {
        &self.queries
    }

    fn table(&self, collection: Collection) -> &BTreeMap<u64, SourceRow> {
        match collection {
            Collection::Watchlist => &self.watchlist,
            Collection::Pages => &self.pages,
        }
    }

    fn table_mut(&mut self, collection: Collection) -> &mut BTreeMap<u64, SourceRow> {
        match collection {
            Collection::Watchlist => &mut self.watchlist,
            Collection::Pages => &mut self.pages,
        }
    }
}

impl RowSource for MemorySource {
    fn fetch(&mut self, collection: Collection, range: Range<u64>) -> Result<Vec<SourceRow>> {
        let query_number = self.queries.len();
        self.queries.push((collection, range.clone()));

        if self.fail_at_query == Some(query_number) {
            return Err(WatchCountError::SourceUnavailable {
                collection: collection.name().to_string(),
                start: range.start,
                end: range.end,
                reason: "injected failure".to_string(),
            });
        }

        let mut rows: Vec<SourceRow> =
            self.table(collection).range(range).map(|(_, row)| row.clone()).collect();
        rows.sort_by(|a, b| a.parts.cmp(&b.parts));
        Ok(rows)
    }
}
