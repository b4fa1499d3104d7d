//! Builders for MediaWiki-shaped SQLite fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};

/// One `watchlist` row: namespace and title of the watched page.
pub type WatchRow<'a> = (i64, &'a str);

/// One `page` row: namespace, title and redirect flag.
pub type PageRow<'a> = (i64, &'a str, bool);

/// Creates `path` with `watchlist` and `page` tables holding the given rows.
///
/// Primary keys are assigned from 1 in the order given, with one watching
/// user per row.
///
/// # Panics
///
/// Panics if the database cannot be written.
pub fn create_wiki_db(path: &Path, watches: &[WatchRow<'_>], pages: &[PageRow<'_>]) {
    let mut conn = Connection::open(path).expect("Failed to create fixture database");
    conn.execute_batch(
        "CREATE TABLE watchlist (wl_id INTEGER PRIMARY KEY, wl_user INTEGER,
                                 wl_namespace INTEGER, wl_title TEXT);
         CREATE TABLE page (page_id INTEGER PRIMARY KEY, page_namespace INTEGER,
                            page_title TEXT, page_is_redirect INTEGER);",
    )
    .expect("Failed to create fixture schema");

    let tx = conn.transaction().expect("Failed to start transaction");
    for (i, (namespace, title)) in watches.iter().enumerate() {
        tx.execute(
            "INSERT INTO watchlist VALUES (?1, ?2, ?3, ?4)",
            params![i as i64 + 1, 100 + i as i64, namespace, title],
        )
        .expect("Failed to insert watchlist row");
    }
    for (i, (namespace, title, redirect)) in pages.iter().enumerate() {
        tx.execute(
            "INSERT INTO page VALUES (?1, ?2, ?3, ?4)",
            params![i as i64 + 1, namespace, title, i64::from(*redirect)],
        )
        .expect("Failed to insert page row");
    }
    tx.commit().expect("Failed to commit fixture");
}

/// Watch rows spread over several chunks, including a title containing the
/// key separator and a watched page (`0::Cherry`) that does not exist.
pub const WATCHES: &[WatchRow<'static>] = &[
    (0, "Banana"),
    (0, "Apple"),
    (0, "Apple"),
    (1, "Apple"),
    (0, "Cherry"),
    (0, "Apple"),
    (4, "Talk::Page"),
    (0, "Banana"),
];

/// Pages for [`WATCHES`]; `0::Cherry` is missing and `0::Durian` is unwatched.
pub const PAGES: &[PageRow<'static>] = &[
    (0, "Apple", false),
    (0, "Banana", true),
    (1, "Apple", false),
    (4, "Talk::Page", false),
    (0, "Durian", false),
];

/// Expected output with every aggregated key.
pub const ALL_COUNTS: &str =
    "3\t0\tApple\n2\t0\tBanana\n1\t0\tCherry\n1\t1\tApple\n1\t4\tTalk::Page\n";

/// Expected output restricted to existing pages.
pub const BACKED_COUNTS: &str = "3\t0\tApple\n2\t0\tBanana\n1\t1\tApple\n1\t4\tTalk::Page\n";

/// Writes the standard fixture into `dir` and returns its path.
pub fn standard_wiki_db(dir: &Path) -> PathBuf {
    let path = dir.join("wiki.sqlite");
    create_wiki_db(&path, WATCHES, PAGES);
    path
}
