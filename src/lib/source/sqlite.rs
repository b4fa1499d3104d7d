//! SQLite-backed source using MediaWiki table and column names.
//!
//! Expected schema (extra columns are ignored):
//!
//! ```sql
//! CREATE TABLE watchlist (wl_id INTEGER PRIMARY KEY, wl_user INTEGER,
//!                         wl_namespace INTEGER, wl_title TEXT);
//! CREATE TABLE page (page_id INTEGER PRIMARY KEY, page_namespace INTEGER,
//!                    page_title TEXT, page_is_redirect INTEGER);
//! ```

use std::ops::Range;
use std::path::Path;

use log::debug;
use rusqlite::types::{FromSqlError, Type, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, params};

use super::{Collection, RowSource, SourceRow};
use crate::errors::{Result, WatchCountError};

const WATCHLIST_QUERY: &str = "SELECT wl_namespace, wl_title, COUNT(wl_id) \
     FROM watchlist \
     WHERE wl_id >= ?1 AND wl_id < ?2 \
     GROUP BY wl_namespace, wl_title \
     ORDER BY wl_namespace, wl_title";

const PAGES_QUERY: &str = "SELECT page_namespace, page_title, page_is_redirect \
     FROM page \
     WHERE page_id >= ?1 AND page_id < ?2 \
     ORDER BY page_namespace, page_title";

/// Row source reading a SQLite database.
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    /// Opens an existing database read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            WatchCountError::SourceUnavailable {
                collection: "database".to_string(),
                start: 0,
                end: 0,
                reason: format!("{}: {e}", path.display()),
            }
        })?;
        Ok(Self { conn })
    }

    /// Wraps an already-open connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn query(
        &self,
        collection: Collection,
        range: &Range<u64>,
    ) -> rusqlite::Result<Vec<SourceRow>> {
        let sql = match collection {
            Collection::Watchlist => WATCHLIST_QUERY,
            Collection::Pages => PAGES_QUERY,
        };
        // Ids above i64::MAX cannot exist in SQLite, so clamping keeps the range exact.
        let start = i64::try_from(range.start).unwrap_or(i64::MAX);
        let end = i64::try_from(range.end).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![start, end], map_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SourceRow> {
    let namespace: i64 = row.get(0)?;
    let title = match row.get_ref(1)? {
        value @ (ValueRef::Text(bytes) | ValueRef::Blob(bytes)) => {
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, value.data_type(), Box::new(e))
            })?
        }
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                other.data_type(),
                Box::new(FromSqlError::InvalidType),
            ));
        }
    };
    let value: i64 = row.get::<_, Option<i64>>(2)?.unwrap_or(0);
    let value = u64::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;
    Ok(SourceRow { parts: vec![namespace.to_string(), title], value })
}

impl RowSource for SqliteSource {
    fn fetch(&mut self, collection: Collection, range: Range<u64>) -> Result<Vec<SourceRow>> {
        debug!("Querying {collection} ids [{}, {})", range.start, range.end);
        self.query(collection, &range).map_err(|e| WatchCountError::SourceUnavailable {
            collection: collection.name().to_string(),
            start: range.start,
            end: range.end,
            reason: e.to_string(),
        })
    }
}
