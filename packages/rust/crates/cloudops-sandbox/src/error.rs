//! Error types for namespace building and execution.

use std::path::PathBuf;

use cloudops_types::{Backend, Failure, FailureKind};
use thiserror::Error;

/// Credential resolution failures.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Required identifying information is absent and has no default.
    #[error("{0} is required but was not provided and has no ambient default")]
    Missing(String),

    /// Only part of a credential that must be supplied as a whole.
    #[error("Incomplete credentials: {0}")]
    Incomplete(String),

    /// Named profile does not exist.
    #[error("Profile '{profile}' not found for {backend}")]
    ProfileNotFound {
        /// Backend the profile was looked up for.
        backend: Backend,
        /// Profile name.
        profile: String,
    },

    /// Profile file could not be read.
    #[error("Failed to read profile file {path}: {message}")]
    ProfileSource {
        /// File involved.
        path: PathBuf,
        /// Failure description.
        message: String,
    },

    /// The role exchange failed.
    #[error("Role assumption failed: {0}")]
    RoleAssumption(String),

    /// Credentials for one backend were sent to another.
    #[error("Credentials for {actual} cannot be used with the {expected} backend")]
    BackendMismatch {
        /// Backend requested.
        expected: Backend,
        /// Backend the credentials belong to.
        actual: Backend,
    },
}

impl From<CredentialError> for Failure {
    fn from(err: CredentialError) -> Self {
        let kind = match err {
            CredentialError::BackendMismatch { .. } => FailureKind::Parameter,
            _ => FailureKind::Credential,
        };
        Failure::new(kind, err.to_string())
    }
}

/// Executor setup errors.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The configured interpreter is not on `PATH`.
    #[error("Interpreter '{name}' not found: {message}")]
    InterpreterNotFound {
        /// Configured interpreter.
        name: String,
        /// Lookup failure.
        message: String,
    },
}

/// Result type for executor setup.
pub type Result<T> = std::result::Result<T, ExecutorError>;
