//! cloudops-remote - One-shot SSH command execution
//!
//! Each request opens a fresh session, authenticates, runs exactly one
//! command, captures both streams and the exit status, and closes the
//! session on every path.
//!
//! - [`CommandSanitizer`]: destructive-pattern screening before connect
//! - [`load_private_key`]: RSA, Ed25519 and ECDSA keys; DSA is refused
//! - [`RemoteTransport`] / [`RemoteSession`]: the seam over libssh2
//! - [`RemoteCommandRunner`]: the async entry point returning an
//!   [`ExecutionResult`](cloudops_types::ExecutionResult)

#![allow(clippy::doc_markdown)]

pub mod config;
pub mod keys;
pub mod sanitize;
pub mod session;

mod error;
mod runner;

pub use config::{HostKeyPolicy, RemoteConfig};
pub use error::{KeyError, RemoteError, Result};
pub use keys::{KeyAlgorithm, PrivateKey, load_private_key, parse_private_key};
pub use runner::{RemoteCommandRunner, RemoteRequest, RemoteTarget, SessionState, SshAuth};
pub use sanitize::{CommandSanitizer, DEFAULT_DENIED_PATTERNS};
pub use session::{
    AuthMethods, CommandOutput, ConnectParams, RemoteSession, RemoteTransport, SessionGuard,
    Ssh2Transport,
};
