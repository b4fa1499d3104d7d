//! CLI command implementations for watchcount.
//!
//! Each submodule implements one subcommand.
//!
//! # Commands
//!
//! - [`run`] - Extract, sort, aggregate and join watcher counts
//! - [`cleanup`] - Remove a run's intermediate artifacts
//! - [`verify`] - Check an artifact is sorted by its leading key

// Blanket clippy pedantic allows for command implementations.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod cleanup;
pub mod command;
pub mod common;
pub mod run;
pub mod verify;
