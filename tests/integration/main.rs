//! Integration tests for watchcount.
//!
//! These tests drive the library against SQLite fixtures and the compiled
//! binary end to end.

mod helpers;
mod test_cleanup_command;
mod test_pipeline;
mod test_run_command;
mod test_verify_command;
