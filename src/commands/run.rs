//! Run the full watcher-count pipeline.
//!
//! Extracts watch rows from a MediaWiki-shaped SQLite database in bounded
//! primary-key windows, sorts and aggregates them on disk, and optionally
//! restricts the counts to pages that exist.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use watchcount_lib::logging::format_count;
use watchcount_lib::metrics::write_metrics;
use watchcount_lib::pipeline::{JoinStrategy, PipelineConfig, run_pipeline};
use watchcount_lib::source::SqliteSource;
use watchcount_lib::validation::{validate_file_exists, validate_parent_dir};

use crate::commands::command::Command;
use crate::commands::common::{SortOptions, WorkDirOptions};

/// Count watchers per page.
#[derive(Debug, Parser)]
#[command(
    name = "run",
    about = "\x1b[38;5;72m[PIPELINE]\x1b[0m       \x1b[36mCount watchers per page with bounded memory\x1b[0m",
    long_about = r#"
Count the watchers of every page in a MediaWiki-shaped SQLite database.

The watchlist table is read in primary-key windows of --chunk-size rows, each
window grouped by page. The per-window counts are sorted by page key on disk
and collapsed into one total per page, so memory use is bounded by the chunk
size and the sorter's budget rather than by the table size.

JOIN STRATEGIES:

  none        Output every aggregated page key.

  index       Load existing pages into an ordered on-disk index and keep only
              counts whose page exists.

  sort-merge  Extract and sort existing pages, then merge them against the
              sorted counts.

Counts for pages that do not exist (dangling keys) are dropped by both join
strategies unless --keep-dangling is given; they are always counted in the
run summary.

OUTPUT:

  One tab-delimited line per page: count, namespace, title.

EXAMPLES:

  # Plain counts
  watchcount run --source wiki.sqlite -w work -o counts.tsv

  # Only pages that exist, using the in-process sorter with a 1G budget
  watchcount run --source wiki.sqlite -w work -o counts.tsv \
    --strategy sort-merge --sorter merge --max-memory 1G
"#
)]
pub struct Run {
    /// SQLite database with `watchlist` and `page` tables
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,

    #[command(flatten)]
    pub work: WorkDirOptions,

    /// Output file of `count, namespace, title` lines
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Number of primary keys per extraction window
    #[arg(short = 'c', long = "chunk-size", default_value = "100000")]
    pub chunk_size: u64,

    /// First primary key of the first extraction window
    #[arg(long = "start-id", default_value = "1")]
    pub start_id: u64,

    /// How counts are restricted to existing pages
    #[arg(long = "strategy", value_enum, default_value = "none")]
    pub strategy: JoinStrategy,

    #[command(flatten)]
    pub sort: SortOptions,

    /// Index entries buffered in memory before a batch write
    #[arg(long = "index-memtable-entries", default_value = "1000000")]
    pub index_memtable_entries: usize,

    /// Keep counts for pages that do not exist
    #[arg(long = "keep-dangling", default_value = "false")]
    pub keep_dangling: bool,

    /// Optional output file for run metrics
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,
}

impl Run {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.work.work_dir, &self.output);
        config.chunk_size = self.chunk_size;
        config.start_id = self.start_id;
        config.strategy = self.strategy;
        config.sort = self.sort.settings(&self.work.work_dir);
        config.memtable_entries = self.index_memtable_entries;
        config.keep_dangling = self.keep_dangling;
        config
    }
}

impl Command for Run {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.source, "Source database")?;
        if let Some(metrics) = &self.metrics {
            validate_parent_dir(metrics, "metrics")?;
        }
        let config = self.config();
        config.validate()?;

        info!("Starting Run");
        info!("Command line: {command_line}");
        info!("Source: {}", self.source.display());
        info!("Work directory: {}", self.work.work_dir.display());
        info!("Output: {}", self.output.display());
        info!("Chunk size: {}", format_count(self.chunk_size));
        info!("Join strategy: {}", self.strategy.name());
        info!("Sorter: {}", self.sort.log_message());
        if self.keep_dangling {
            info!("Keeping dangling keys");
        }

        let mut source = SqliteSource::open(&self.source)?;
        let metrics = run_pipeline(&config, &mut source)
            .with_context(|| format!("Pipeline failed for {}", self.source.display()))?;

        if let Some(path) = &self.metrics {
            write_metrics(path, &[metrics])?;
            info!("Wrote metrics to {}", path.display());
        }
        Ok(())
    }
}
