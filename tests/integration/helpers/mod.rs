//! Helper utilities for integration tests.

pub mod wiki_db;

pub use wiki_db::*;
