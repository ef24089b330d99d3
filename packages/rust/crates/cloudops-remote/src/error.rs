//! Error types for remote command execution.

use std::path::PathBuf;
use std::time::Duration;

use cloudops_types::{Failure, FailureKind};
use thiserror::Error;

/// Private key loading failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Key file does not exist.
    #[error("Private key file not found: {0}")]
    NotFound(PathBuf),

    /// Key file exists but could not be read.
    #[error("Failed to read private key file {path}: {message}")]
    Read {
        /// File involved.
        path: PathBuf,
        /// I/O failure.
        message: String,
    },

    /// The key uses an algorithm that is no longer accepted.
    #[error("Unsupported private key format: {0} keys are not accepted")]
    Unsupported(String),

    /// The container names a supported algorithm but the key material does
    /// not decode.
    #[error("Invalid {algorithm} private key: {message}")]
    Invalid {
        /// Algorithm the container claimed.
        algorithm: String,
        /// Decoder failure.
        message: String,
    },

    /// No supported algorithm recognized the key.
    #[error("Unable to load private key - unsupported format or invalid key{}", detail_suffix(.0))]
    Unrecognized(Option<String>),

    /// The key is encrypted and no passphrase was given.
    #[error("Private key ({0}) is encrypted and no passphrase was provided")]
    PassphraseRequired(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Remote execution failures.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Missing or invalid request parameter.
    #[error("{0}")]
    Parameter(String),

    /// Blank command.
    #[error("Command cannot be empty")]
    EmptyCommand,

    /// The command matched a destructive pattern.
    #[error("Command contains potentially dangerous pattern: {pattern}")]
    DeniedPattern {
        /// Pattern matched.
        pattern: String,
    },

    /// Private key could not be used.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// TCP connect, handshake or host key verification failed.
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Every offered authentication method was refused.
    #[error("SSH authentication failed: {0}")]
    Authentication(String),

    /// Channel-level failure after authentication.
    #[error("SSH channel error: {0}")]
    Channel(String),

    /// The command did not finish in time.
    #[error("Command timed out after {} seconds", .elapsed.as_secs_f64())]
    Timeout {
        /// Configured bound.
        elapsed: Duration,
    },

    /// Worker failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

impl RemoteError {
    /// Failure kind reported to the caller.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Parameter(_)
            | RemoteError::EmptyCommand
            | RemoteError::DeniedPattern { .. }
            | RemoteError::Key(_) => FailureKind::Parameter,
            RemoteError::Connection(_) | RemoteError::Channel(_) => FailureKind::Connection,
            RemoteError::Authentication(_) => FailureKind::Authentication,
            RemoteError::Timeout { .. } => FailureKind::Runtime,
            RemoteError::Internal(_) => FailureKind::Internal,
        }
    }
}

impl From<RemoteError> for Failure {
    fn from(err: RemoteError) -> Self {
        let failure = Failure::new(err.kind(), err.to_string());
        match err {
            RemoteError::Timeout { elapsed } => failure
                .with_error_type("TimeoutError")
                .with_elapsed(elapsed),
            _ => failure,
        }
    }
}
