//! Pipeline orchestration.
//!
//! A run sequences the stages strictly one after another:
//!
//! 1. remove artifacts and output left behind by a prior run;
//! 2. extract watch rows into the raw artifact;
//! 3. sort it by composite key;
//! 4. aggregate contiguous runs into one record per key;
//! 5. join against the canonical entity set according to [`JoinStrategy`]
//!    and write the final output.
//!
//! Each artifact is deleted as soon as its only consumer has finished with
//! it. A failed join stage removes the partial output. Every stage reports
//! completion through its typed stats, which are folded into the run's
//! [`RunMetrics`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::ValueEnum;
use log::{info, warn};

use crate::aggregate::aggregate_artifact;
use crate::artifact::{ArtifactPaths, remove_artifact};
use crate::errors::{IoContext, Result};
use crate::extract::{ChunkedExtractor, DEFAULT_CHUNK_SIZE};
use crate::index::{DEFAULT_MEMTABLE_ENTRIES, OrderedIndex, PagePayload, remove_index};
use crate::join::{JoinStats, export_aggregate, merge_join, semi_join};
use crate::logging::{OperationTimer, log_run_summary};
use crate::metrics::{RunMetrics, fraction};
use crate::sort::{SortSettings, Sorter};
use crate::source::{Collection, RowSource};
use crate::validation::{validate_parent_dir, validate_positive};

/// How aggregated counts are restricted to existing entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum JoinStrategy {
    /// No join: every aggregated key is output.
    #[default]
    None,
    /// Semi-join against an ordered persistent index.
    Index,
    /// Sort the canonical entities and merge-join.
    SortMerge,
}

impl JoinStrategy {
    /// Name used in logs and metrics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Index => "index",
            Self::SortMerge => "sort-merge",
        }
    }
}

/// Everything a run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory holding the run's intermediate artifacts.
    pub work_dir: PathBuf,
    /// Final output path.
    pub output: PathBuf,
    /// Primary-key window size for extraction.
    pub chunk_size: u64,
    /// First primary key of the first window.
    pub start_id: u64,
    /// Join strategy.
    pub strategy: JoinStrategy,
    /// Sorter selection and resources.
    pub sort: SortSettings,
    /// Index puts buffered before a batch is written.
    pub memtable_entries: usize,
    /// Keep aggregated keys with no canonical entity.
    pub keep_dangling: bool,
}

impl PipelineConfig {
    /// A configuration with defaults for everything but the paths.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output: output.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            start_id: 1,
            strategy: JoinStrategy::default(),
            sort: SortSettings::default(),
            memtable_entries: DEFAULT_MEMTABLE_ENTRIES,
            keep_dangling: false,
        }
    }

    /// Checks parameters before any work starts.
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.chunk_size, "chunk-size")?;
        validate_positive(self.sort.threads, "threads")?;
        validate_positive(self.memtable_entries, "index-memtable-entries")?;
        if let Some(limit) = self.sort.memory_limit {
            validate_positive(limit, "max-memory")?;
        }
        validate_parent_dir(&self.output, "output")?;
        Ok(())
    }
}

/// State owned by one run from start to finish.
pub struct PipelineRun<'a> {
    config: &'a PipelineConfig,
    paths: ArtifactPaths,
    sorter: Box<dyn Sorter>,
    started: Instant,
    metrics: RunMetrics,
}

impl<'a> PipelineRun<'a> {
    /// Prepares a run: validates the configuration and creates the work
    /// directory.
    pub fn new(config: &'a PipelineConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.work_dir).io_context(|| {
            format!("Failed to create work directory {}", config.work_dir.display())
        })?;

        let metrics = RunMetrics {
            strategy: config.strategy.name().to_string(),
            chunk_size: config.chunk_size,
            ..RunMetrics::default()
        };
        Ok(Self {
            config,
            paths: ArtifactPaths::in_dir(&config.work_dir),
            sorter: config.sort.build(),
            started: Instant::now(),
            metrics,
        })
    }

    /// Artifact locations for this run.
    #[must_use]
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Executes every stage and returns the run's metrics.
    pub fn execute<S: RowSource + ?Sized>(mut self, source: &mut S) -> Result<RunMetrics> {
        let stale = self.paths.remove_all()?;
        if stale > 0 {
            info!("Removed {} stale artifacts from a previous run", stale);
        }
        if remove_artifact(&self.config.output)? {
            info!("Removed previous output {}", self.config.output.display());
        }

        self.extract_watchlist(source)?;
        self.sort_artifact(&self.paths.watch_raw, &self.paths.watch_sorted)?;
        self.aggregate()?;

        let joined = match self.config.strategy {
            JoinStrategy::None => self.export(),
            JoinStrategy::Index => self.index_join(source),
            JoinStrategy::SortMerge => self.sort_merge_join(source),
        };
        if let Err(err) = joined {
            if let Err(cleanup_err) = remove_artifact(&self.config.output) {
                warn!("Failed to remove partial output: {cleanup_err}");
            }
            return Err(err);
        }

        self.metrics.elapsed_seconds = self.started.elapsed().as_secs_f64();
        log_run_summary(&self.metrics);
        Ok(self.metrics)
    }

    fn extract_watchlist<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let timer = OperationTimer::new("Extracting watchlist rows");
        let extractor = ChunkedExtractor::new(Collection::Watchlist, self.config.chunk_size)?
            .start_id(self.config.start_id);
        let stats = extractor.run_to_artifact(source, &self.paths.watch_raw)?;
        timer.log_completion(stats.rows);

        self.metrics.watch_queries = stats.queries;
        self.metrics.rows_extracted = stats.rows;
        Ok(())
    }

    /// Sorts `input` into `output`, then deletes `input`.
    fn sort_artifact(&self, input: &Path, output: &Path) -> Result<()> {
        let timer = OperationTimer::new(&format!("Sorting with {}", self.sorter.name()));
        let stats = self.sorter.sort(input, output)?;
        timer.log_completion(stats.output_records);
        remove_artifact(input)?;
        Ok(())
    }

    fn aggregate(&mut self) -> Result<()> {
        let timer = OperationTimer::new("Aggregating watch counts");
        let stats = aggregate_artifact(&self.paths.watch_sorted, &self.paths.aggregate)?;
        timer.log_completion(stats.rows_read);
        remove_artifact(&self.paths.watch_sorted)?;

        self.metrics.rows_aggregated = stats.rows_read;
        self.metrics.aggregate_records = stats.records_written;
        Ok(())
    }

    fn export(&mut self) -> Result<()> {
        self.metrics.output_records = export_aggregate(&self.paths.aggregate, &self.config.output)?;
        remove_artifact(&self.paths.aggregate)?;
        Ok(())
    }

    fn index_join<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let timer = OperationTimer::new("Building page index");
        let mut index = OrderedIndex::<PagePayload>::open(&self.paths.index)?
            .memtable_entries(self.config.memtable_entries);
        let extractor = ChunkedExtractor::new(Collection::Pages, self.config.chunk_size)?
            .start_id(self.config.start_id);
        extractor.run(source, |rows| {
            for row in rows {
                index.set(row.key().as_str(), PagePayload::from_flag(row.value))?;
            }
            Ok(())
        })?;
        let index_stats = index.close()?;
        timer.log_completion(index_stats.sets);
        self.metrics.entities_extracted = index_stats.sets;

        let timer = OperationTimer::new("Joining against page index");
        let mut index = OrderedIndex::<PagePayload>::open_read_only(&self.paths.index)?;
        let (output, keep_dangling) = (&self.config.output, self.config.keep_dangling);
        let stats = semi_join(&self.paths.aggregate, &mut index, output, keep_dangling)?;
        drop(index);
        timer.log_completion(stats.aggregates);

        remove_artifact(&self.paths.aggregate)?;
        remove_index(&self.paths.index)?;
        self.record_join(&stats);
        Ok(())
    }

    fn sort_merge_join<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let timer = OperationTimer::new("Extracting pages");
        let extractor = ChunkedExtractor::new(Collection::Pages, self.config.chunk_size)?
            .start_id(self.config.start_id);
        let extracted = extractor.run_to_artifact(source, &self.paths.pages_raw)?;
        timer.log_completion(extracted.rows);
        self.metrics.entities_extracted = extracted.rows;

        self.sort_artifact(&self.paths.pages_raw, &self.paths.pages_sorted)?;

        let timer = OperationTimer::new("Merge-joining pages with watch counts");
        let stats = merge_join(
            &self.paths.pages_sorted,
            &self.paths.aggregate,
            &self.config.output,
            self.config.keep_dangling,
        )?;
        timer.log_completion(stats.aggregates);

        remove_artifact(&self.paths.pages_sorted)?;
        remove_artifact(&self.paths.aggregate)?;
        self.record_join(&stats);
        Ok(())
    }

    fn record_join(&mut self, stats: &JoinStats) {
        self.metrics.backed_keys = stats.backed;
        self.metrics.dangling_keys = stats.dangling;
        self.metrics.dangling_fraction = fraction(stats.dangling, stats.aggregates);
        self.metrics.output_records = stats.output_records;
    }
}

/// Runs the whole pipeline for `config` against `source`.
pub fn run_pipeline<S: RowSource + ?Sized>(
    config: &PipelineConfig,
    source: &mut S,
) -> Result<RunMetrics> {
    PipelineRun::new(config)?.execute(source)
}

/// Removes every artifact a run may have left in `work_dir`.
///
/// Returns the number of paths removed; missing artifacts are ignored.
pub fn cleanup(work_dir: &Path) -> Result<usize> {
    let removed = ArtifactPaths::in_dir(work_dir).remove_all()?;
    info!("Removed {} artifacts from {}", removed, work_dir.display());
    Ok(removed)
}
