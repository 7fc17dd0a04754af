//! Common error types for deckdata

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Common result type for deckdata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which store holds edits that an operation would discard
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSide {
    /// CSV files changed since the last sync
    Tabular,
    /// The cache was written to since the last sync
    Cache,
}

impl fmt::Display for ConflictSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictSide::Tabular => write!(f, "CSV files"),
            ConflictSide::Cache => write!(f, "cache"),
        }
    }
}

/// Common error types across deckdata crates
#[derive(Error, Debug)]
pub enum Error {
    /// A CSV file or the cache violates naming, column or schema conventions
    #[error("Schema error in '{file}': {reason}")]
    Schema { file: String, reason: String },

    /// Freshness check failed in strict mode
    #[error("Sync conflict: unsaved changes in {side} ({details})")]
    SyncConflict { side: ConflictSide, details: String },

    /// A dependent row references a vocabulary key that does not exist
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The cache has not been created yet
    #[error("Cache not found at {0}; run an import first")]
    CacheMissing(PathBuf),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV content
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for a schema error about one file
    pub fn schema(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
