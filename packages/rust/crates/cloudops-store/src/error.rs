//! Error types for the snippet store.

use std::path::PathBuf;

use cloudops_vetter::VettingError;
use thiserror::Error;

/// Snippet store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Saving a new name would exceed the configured capacity.
    #[error("Maximum number of snippets ({max}) reached; delete one before saving '{name}'")]
    LimitReached {
        /// Configured capacity.
        max: usize,
        /// Rejected name.
        name: String,
    },

    /// Snippet name is empty or malformed.
    #[error("Invalid snippet name: {0}")]
    InvalidName(String),

    /// Snippet code does not parse.
    #[error("Snippet '{name}' has a syntax error: {source}")]
    Syntax {
        /// Snippet name.
        name: String,
        /// Parser failure.
        source: VettingError,
    },

    /// No snippet with that name.
    #[error("Snippet '{0}' not found")]
    NotFound(String),

    /// Reading or writing the backing file failed.
    #[error("Persistence error at {path}: {source}")]
    Persist {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Backing file is not valid JSON.
    #[error("Corrupt snippet file {path}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Decode failure.
        source: serde_json::Error,
    },

    /// Serializing the state failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
