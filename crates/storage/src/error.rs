//! Storage error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Table is not part of the loaded schema
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Key absent from an index
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Column referenced by a projection does not exist
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Insert carried more values than the table has columns
    #[error("Too many values for table {table}: {given} given, {expected} columns")]
    TooManyValues {
        table: String,
        given: usize,
        expected: usize,
    },

    /// Table already locked by another statement
    #[error("Table is locked: {0}")]
    LockContention(String),

    /// Predicate could not be evaluated
    #[error("Malformed predicate: {0}")]
    MalformedPredicate(String),

    /// Console statement could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Persisted state is unreadable
    #[error("Corrupt file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// File system failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPredicate(msg.into())
    }
}

/// Attach a path to an I/O error
pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| {
        tracing::error!(path = %path.display(), %source, "Storage I/O failure");
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
