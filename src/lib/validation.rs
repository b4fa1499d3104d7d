//! Input validation utilities
//!
//! Common checks for command-line parameters and paths, all reporting
//! [`WatchCountError::InvalidParameter`] with the offending parameter name.

use std::fmt::Display;
use std::path::Path;

use crate::errors::{Result, WatchCountError};

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Source database")
///
/// # Errors
/// Returns an error if the path does not exist or is not a regular file
///
/// # Example
/// ```
/// use watchcount_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/wiki.sqlite", "Source database");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_file() {
        return Err(WatchCountError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("File does not exist: {}", path_ref.display()),
        });
    }
    Ok(())
}

/// Validate that the directory an output file will be written to exists
///
/// A bare file name (no directory component) is written to the current
/// directory and always passes.
///
/// # Errors
/// Returns an error if the parent directory is missing
pub fn validate_parent_dir<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    match path_ref.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(WatchCountError::InvalidParameter {
                parameter: description.to_string(),
                reason: format!("Directory does not exist: {}", parent.display()),
            })
        }
        _ => Ok(()),
    }
}

/// Validate that a value is positive (> 0)
///
/// # Arguments
/// * `value` - Value to validate
/// * `name` - Name of the parameter for error messages
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use watchcount_lib::validation::validate_positive;
///
/// validate_positive(100_000, "chunk-size").unwrap();
///
/// let result = validate_positive(0, "chunk-size");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(WatchCountError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}
