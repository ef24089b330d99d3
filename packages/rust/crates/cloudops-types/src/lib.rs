//! cloudops-types - Common type definitions for CloudOps
//!
//! This crate provides the data structures shared by the vetter, the
//! sandbox executor, the remote runner and the tool server:
//!
//! - [`Backend`]: which execution namespace a snippet is built against
//! - [`Secret`]: credential material that never reaches logs or JSON
//! - [`ExecutionResult`]: the tagged outcome of one execution
//! - [`ToolResponse`]: the single wire shape every outcome is normalized into

#![allow(clippy::doc_markdown)]

mod backend;
mod response;
mod result;
mod secret;

pub use backend::{Backend, ParseBackendError};
pub use response::ToolResponse;
pub use result::{ExecutionResult, Failure, FailureKind, RemoteOutcome, SuccessOutcome};
pub use secret::Secret;
