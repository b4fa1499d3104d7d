#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: Counters move between u64, usize and f64 for rates and fractions
// - missing_*_doc: Documentation improvements tracked separately
// - needless_pass_by_value: Some APIs designed for ownership transfer
// - items_after_statements: Some test code uses late item declarations
// - module_name_repetitions: Stats types are named after their stage module
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::module_name_repetitions,
    clippy::redundant_closure_for_method_calls,
    clippy::uninlined_format_args
)]

//! # watchcount - bounded-memory watcher counts
//!
//! This library computes, for every page of a wiki database, the number of
//! users watching it, without ever holding a whole table in memory. Rows are
//! pulled in primary-key windows, spilled to tab-delimited artifacts, sorted
//! by composite key, collapsed into one record per key and finally joined
//! against the set of existing pages.
//!
//! ## Overview
//!
//! ### Stages
//!
//! - **[`extract`]** - Chunked key-range extraction from a [`source::RowSource`]
//! - **[`sort`]** - Total ordering of artifacts by their leading key column
//! - **[`aggregate`]** - Streaming run aggregation of sorted records
//! - **[`index`]** - Ordered persistent key/value index used by the semi-join
//! - **[`join`]** - Index semi-join and sort-merge join
//! - **[`pipeline`]** - Run orchestration and cleanup
//!
//! ### Data
//!
//! - **[`key`]** - Escaped composite keys
//! - **[`artifact`]** - Artifact readers, writers and paths
//! - **[`source`]** - SQLite and in-memory row sources
//!
//! ### Utilities
//!
//! - **[`errors`]** - Library error type
//! - **[`validation`]** - Input validation utilities for parameters and files
//! - **[`progress`]** - Progress tracking and logging
//! - **[`logging`]** - Formatting helpers and the run summary
//! - **[`metrics`]** - Run metrics and TSV writing
//!
//! ## Quick Start
//!
//! ```
//! use watchcount_lib::pipeline::{JoinStrategy, PipelineConfig, run_pipeline};
//! use watchcount_lib::sort::SorterKind;
//! use watchcount_lib::source::{Collection, MemorySource, SourceRow};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let mut source = MemorySource::new()
//!     .with_row(Collection::Watchlist, 1, SourceRow::page(0, "Apple", 3))
//!     .with_row(Collection::Watchlist, 2, SourceRow::page(0, "Apple", 2))
//!     .with_row(Collection::Pages, 1, SourceRow::page(0, "Apple", 0));
//!
//! let mut config = PipelineConfig::new(dir.path().join("work"), dir.path().join("counts.tsv"));
//! config.strategy = JoinStrategy::SortMerge;
//! config.sort.kind = SorterKind::Merge;
//!
//! let metrics = run_pipeline(&config, &mut source)?;
//! assert_eq!(metrics.output_records, 1);
//! assert_eq!(std::fs::read_to_string(dir.path().join("counts.tsv"))?, "5\t0\tApple\n");
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod artifact;
pub mod errors;
pub mod extract;
pub mod index;
pub mod join;
pub mod key;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod sort;
pub mod source;
pub mod validation;
