//! Error types for predicate-db
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Recovery policy:
//! - `FormatCorruption`: record skipped, counted as a failed sample
//! - `FileIo`: file skipped, counted as a file with errors
//! - `MachineAccess`: fatal to the current predicate only
//! - `FatalIo`, `Config`: abort the triggering call

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// predicate-db error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed backend spec, preference string or configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Machine context could not be opened or initialised
    #[error("Cannot access machine {machine}: {reason}")]
    MachineAccess {
        /// Machine file (or `<none>` for the empty context)
        machine: String,
        /// Underlying cause
        reason: String,
    },

    /// A single record failed to parse
    #[error("Corrupt record in {file} at line {line}: {reason}")]
    FormatCorruption {
        /// File containing the record
        file: PathBuf,
        /// 1-based line number
        line: usize,
        /// Parse failure
        reason: String,
    },

    /// I/O failure confined to one file
    #[error("I/O error on {path}: {source}")]
    FileIo {
        /// Offending file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Source or target root inaccessible; aborts the whole operation
    #[error("Fatal I/O error on {path}: {reason}")]
    FatalIo {
        /// Root directory
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Timing lookup for a backend that was never evaluated
    #[error("Backend {0} was not evaluated for this predicate")]
    BackendNotEvaluated(String),

    /// Operation not supported by the receiver (e.g. writing a read-only format)
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Engine invocation failed
    #[error("Engine error: {0}")]
    Engine(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an I/O error with the file it happened on
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Build a fatal tree-level error
    pub fn fatal_io(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FatalIo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only invalidate a single record
    #[must_use]
    pub const fn is_record_level(&self) -> bool {
        matches!(self, Self::FormatCorruption { .. })
    }
}
