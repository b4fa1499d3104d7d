//! Custom error types for watchcount operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watchcount operations
pub type Result<T> = std::result::Result<T, WatchCountError>;

/// Error type for watchcount operations
#[derive(Error, Debug)]
pub enum WatchCountError {
    /// The source store failed while serving a bounded extraction query.
    #[error("Source unavailable while reading {collection} ids [{start}, {end}): {reason}")]
    SourceUnavailable {
        /// Name of the collection being extracted
        collection: String,
        /// Inclusive lower bound of the failed range
        start: u64,
        /// Exclusive upper bound of the failed range
        end: u64,
        /// Underlying failure
        reason: String,
    },

    /// An external tool could not be run or exited unsuccessfully.
    #[error("External tool '{tool}' failed ({status}): {stderr}")]
    ExternalToolFailure {
        /// Program that was invoked
        tool: String,
        /// Exit status, or the spawn failure
        status: String,
        /// Captured standard error (possibly empty)
        stderr: String,
    },

    /// The ordered index could not be opened, read or written.
    #[error("Index '{path}' unavailable: {reason}")]
    IndexUnavailable {
        /// Path of the index file
        path: PathBuf,
        /// Explanation of the problem
        reason: String,
    },

    /// A line in an artifact could not be parsed.
    #[error("Malformed record at {path}:{line}: {reason}")]
    MalformedRecord {
        /// Artifact path
        path: PathBuf,
        /// 1-based line number
        line: u64,
        /// Explanation of the problem
        reason: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Summing the measures of one key overflowed `u64`.
    #[error("Measure overflow while aggregating key '{key}'")]
    MeasureOverflow {
        /// The encoded composite key
        key: String,
    },

    /// Any other I/O failure.
    #[error("{context}")]
    Io {
        /// What was being attempted
        context: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl WatchCountError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Builds an [`WatchCountError::IndexUnavailable`] for `path`.
    pub fn index(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexUnavailable { path: path.into(), reason: reason.into() }
    }
}

/// Extension trait attaching a context message to raw I/O results.
pub trait IoContext<T> {
    /// Converts an `io::Result` into a [`Result`] with the given context.
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| WatchCountError::io(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_unavailable() {
        let error = WatchCountError::SourceUnavailable {
            collection: "watchlist".to_string(),
            start: 1,
            end: 101,
            reason: "database is locked".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("watchlist ids [1, 101)"));
        assert!(msg.contains("database is locked"));
    }

    #[test]
    fn test_external_tool_failure() {
        let error = WatchCountError::ExternalToolFailure {
            tool: "sort".to_string(),
            status: "exit status: 2".to_string(),
            stderr: "sort: cannot read".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("External tool 'sort' failed (exit status: 2)"));
        assert!(msg.contains("cannot read"));
    }

    #[test]
    fn test_index_unavailable() {
        let error = WatchCountError::index("/tmp/pages.idx", "lock held");
        assert_eq!(format!("{error}"), "Index '/tmp/pages.idx' unavailable: lock held");
    }

    #[test]
    fn test_io_context_keeps_source() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let error = result.io_context(|| "Failed to open artifact").unwrap_err();
        assert_eq!(format!("{error}"), "Failed to open artifact");
        assert_eq!(error.source().map(ToString::to_string), Some("gone".to_string()));
    }
}
