//! Remove a run's intermediate artifacts.

use anyhow::Result;
use clap::Parser;
use log::info;
use watchcount_lib::pipeline::cleanup;

use crate::commands::command::Command;
use crate::commands::common::WorkDirOptions;

/// Remove every artifact and the index a run left in its work directory.
///
/// Missing artifacts are ignored, so the command can be repeated safely.
#[derive(Debug, Parser)]
#[command(
    name = "cleanup",
    about = "\x1b[38;5;166m[UTILITIES]\x1b[0m      \x1b[36mRemove intermediate artifacts of a run\x1b[0m"
)]
pub struct Cleanup {
    #[command(flatten)]
    pub work: WorkDirOptions,
}

impl Command for Cleanup {
    fn execute(&self, _command_line: &str) -> Result<()> {
        info!("Cleaning up {}", self.work.work_dir.display());
        let removed = cleanup(&self.work.work_dir)?;
        if removed == 0 {
            info!("Nothing to remove");
        }
        Ok(())
    }
}
