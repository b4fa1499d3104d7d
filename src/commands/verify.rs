//! Verify that an artifact is sorted by its leading key column.
//!
//! The run aggregator assumes sorted input and does not detect ordering
//! violations itself; this command checks an artifact after the fact.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::{error, info};
use watchcount_lib::logging::{OperationTimer, format_count};
use watchcount_lib::sort::check_order;
use watchcount_lib::validation::validate_file_exists;

use crate::commands::command::Command;

/// Check the key order of an artifact.
///
/// Reads records sequentially and checks that each record's leading key is
/// >= the previous record's key. Exits 0 if sorted correctly, non-zero if any
/// records are out of order.
#[derive(Debug, Parser)]
#[command(
    name = "verify",
    about = "\x1b[38;5;166m[UTILITIES]\x1b[0m      \x1b[36mVerify an artifact is sorted by key\x1b[0m"
)]
pub struct Verify {
    /// Artifact to check
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

impl Command for Verify {
    fn execute(&self, _command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input artifact")?;

        let timer = OperationTimer::new("Verifying artifact sort order");
        info!("Input: {}", self.input.display());

        let check = check_order(&self.input)?;
        timer.log_completion(check.records);

        if let Some((line, key)) = &check.first_violation {
            error!("First violation at line {line}: key {key}");
        }
        if !check.is_sorted() {
            bail!(
                "{} is not sorted: {} of {} records out of order",
                self.input.display(),
                format_count(check.violations),
                format_count(check.records)
            );
        }

        info!("{} is sorted ({} records)", self.input.display(), format_count(check.records));
        Ok(())
    }
}
