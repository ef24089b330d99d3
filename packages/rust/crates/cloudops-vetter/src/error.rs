//! Error types for snippet vetting.

use cloudops_types::{Failure, FailureKind};
use thiserror::Error;

/// Reasons a snippet is refused before it runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VettingError {
    /// The snippet does not parse (or contains a NUL byte).
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    Syntax {
        /// Parser message.
        message: String,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
    },

    /// A denied callable is invoked by bare name.
    #[error("Use of '{name}' is not allowed (line {line}, column {column})")]
    UnsafeConstruct {
        /// Denied callee.
        name: String,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
    },

    /// The tree-sitter grammar could not be loaded.
    #[error("Parser unavailable: {0}")]
    Parser(String),
}

/// Result type for vetting operations.
pub type Result<T> = std::result::Result<T, VettingError>;

impl From<VettingError> for Failure {
    fn from(err: VettingError) -> Self {
        match err {
            VettingError::Parser(_) => Failure::new(FailureKind::Internal, err.to_string()),
            _ => Failure::new(FailureKind::Vetting, err.to_string()),
        }
    }
}
