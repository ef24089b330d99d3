//! cloudops-sandbox - Credential-scoped, timeout-bounded snippet execution
//!
//! Pipeline for one local snippet:
//!
//! 1. [`cloudops_vetter::SnippetVetter`] rejects unparsable or denied code
//! 2. a [`NamespaceFactory`] resolves credentials and describes the
//!    capability handles (`session`, `client`, `compute_client`, ...)
//! 3. stored snippets are optionally preloaded
//! 4. a [`SnippetRunner`] executes it in a fresh interpreter process under a
//!    deadline and normalizes the outcome
//!
//! [`ExecutionEngine`] wires these together.

pub mod config;
pub mod credentials;
mod engine;
mod error;
pub mod executor;
pub mod namespace;

pub use config::{BackendsConfig, ExecutorConfig};
pub use credentials::{CredentialBundle, CredentialSources};
pub use engine::{ExecutionEngine, ExecutionReport, ExecutionRequest};
pub use error::{CredentialError, ExecutorError, Result};
pub use executor::{PythonProcessRunner, SnippetRunner};
pub use namespace::{
    BuildOptions, ExecutionNamespace, FactoryRegistry, NamespaceFactory, PyExpr,
};
