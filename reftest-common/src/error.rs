//! Common error types for reftest

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for reftest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the indexing and matching crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Exposure or reference file could not be opened or parsed
    #[error("Cannot read {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A record with this filename is already indexed
    #[error("Duplicate key: {0} is already indexed")]
    DuplicateKey(String),

    /// No applicability rule could be found for a reference file
    #[error("Rule resolution failed: {0}")]
    Resolution(String),

    /// Predicate referenced something the store does not know about
    #[error("Malformed query: {0}")]
    Query(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a [`Error::Parse`] for `path`
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
