//! Execution namespace: the named capability handles a snippet can see.
//!
//! A namespace is a recipe, not live objects. Each binding is a small
//! Python expression ([`PyExpr`]) evaluated by the interpreter prelude in
//! declaration order; secrets travel separately through the interpreter
//! environment and are removed from it before any snippet code runs.

mod aws;
mod azure;
mod hetzner;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cloudops_types::{Backend, Secret};

pub use aws::{AwsNamespaceFactory, BUILTIN_HELPER_MODULE};
pub use azure::AzureNamespaceFactory;
pub use hetzner::HetznerNamespaceFactory;

use crate::config::BackendsConfig;
use crate::credentials::{CredentialBundle, CredentialSources};
use crate::error::CredentialError;

/// Prefix of the environment variables carrying secrets into the prelude.
pub const SECRET_ENV_PREFIX: &str = "CLOUDOPS_SECRET_";

/// Expression evaluated by the interpreter prelude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyExpr {
    /// `import module` or `from module import attr`.
    Import {
        /// Dotted module path.
        module: String,
        /// Attribute taken from the module.
        attr: Option<String>,
    },
    /// String literal.
    Str(String),
    /// Secret delivered through the named environment variable.
    Secret(String),
    /// Earlier binding by name.
    Binding(String),
    /// `None`.
    None,
    /// Call with positional and keyword arguments.
    Call {
        /// Callee.
        callee: Box<PyExpr>,
        /// Positional arguments.
        args: Vec<PyExpr>,
        /// Keyword arguments, in order.
        kwargs: Vec<(String, PyExpr)>,
    },
}

impl PyExpr {
    /// `import module`.
    pub fn module(module: impl Into<String>) -> Self {
        PyExpr::Import {
            module: module.into(),
            attr: None,
        }
    }

    /// `from module import attr`.
    pub fn from_import(module: impl Into<String>, attr: impl Into<String>) -> Self {
        PyExpr::Import {
            module: module.into(),
            attr: Some(attr.into()),
        }
    }

    /// String literal.
    pub fn str(value: impl Into<String>) -> Self {
        PyExpr::Str(value.into())
    }

    /// Reference to an earlier binding.
    pub fn binding(name: impl Into<String>) -> Self {
        PyExpr::Binding(name.into())
    }

    /// Call `self` with no arguments.
    #[must_use]
    pub fn call(self) -> Self {
        PyExpr::Call {
            callee: Box::new(self),
            args: Vec::new(),
            kwargs: Vec::new(),
        }
    }

    /// Append a positional argument. Wraps `self` into a call if needed.
    #[must_use]
    pub fn arg(self, value: PyExpr) -> Self {
        match self {
            PyExpr::Call {
                callee,
                mut args,
                kwargs,
            } => {
                args.push(value);
                PyExpr::Call {
                    callee,
                    args,
                    kwargs,
                }
            }
            other => other.call().arg(value),
        }
    }

    /// Append a keyword argument. Wraps `self` into a call if needed.
    #[must_use]
    pub fn kwarg(self, name: impl Into<String>, value: PyExpr) -> Self {
        match self {
            PyExpr::Call {
                callee,
                args,
                mut kwargs,
            } => {
                kwargs.push((name.into(), value));
                PyExpr::Call {
                    callee,
                    args,
                    kwargs,
                }
            }
            other => other.call().kwarg(name, value),
        }
    }
}

/// One named handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    /// Name visible to the snippet.
    pub name: String,
    /// How to build it.
    pub expr: PyExpr,
    /// A failing optional binding is skipped with a warning instead of
    /// failing the execution.
    pub optional: bool,
}

/// Per-request execution namespace.
#[derive(Debug)]
pub struct ExecutionNamespace {
    backend: Backend,
    bindings: Vec<NamespaceBinding>,
    secrets: Vec<(String, Secret)>,
    env: Vec<(String, String)>,
    modules: Vec<(String, String)>,
    preloads: Vec<(String, String)>,
}

impl ExecutionNamespace {
    /// Empty namespace for `backend`.
    #[must_use]
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            bindings: Vec::new(),
            secrets: Vec::new(),
            env: Vec::new(),
            modules: Vec::new(),
            preloads: Vec::new(),
        }
    }

    /// Backend this namespace was built for.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Add a required binding. Rebinding a name replaces it in place.
    pub fn bind(&mut self, name: impl Into<String>, expr: PyExpr) -> &mut Self {
        self.push(name.into(), expr, false)
    }

    /// Add an optional binding.
    pub fn bind_optional(&mut self, name: impl Into<String>, expr: PyExpr) -> &mut Self {
        self.push(name.into(), expr, true)
    }

    fn push(&mut self, name: String, expr: PyExpr, optional: bool) -> &mut Self {
        if let Some(existing) = self.bindings.iter_mut().find(|b| b.name == name) {
            existing.expr = expr;
            existing.optional = optional;
        } else {
            self.bindings.push(NamespaceBinding {
                name,
                expr,
                optional,
            });
        }
        self
    }

    /// `json`, `datetime` and `timedelta`, present in every namespace.
    pub fn bind_common_modules(&mut self) -> &mut Self {
        self.bind("json", PyExpr::module("json"))
            .bind("datetime", PyExpr::from_import("datetime", "datetime"))
            .bind("timedelta", PyExpr::from_import("datetime", "timedelta"))
    }

    /// Register a secret and get the expression that reads it.
    pub fn secret(&mut self, value: Secret) -> PyExpr {
        let var = format!("{SECRET_ENV_PREFIX}{}", self.secrets.len());
        self.secrets.push((var.clone(), value));
        PyExpr::Secret(var)
    }

    /// Set a plain (non-secret) interpreter environment variable.
    pub fn set_env(&mut self, var: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((var.into(), value.into()));
        self
    }

    /// Ship a Python module with the program. It is importable under `name`
    /// before any binding is evaluated.
    pub fn provide_module(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = name.into();
        if !self.modules.iter().any(|(existing, _)| *existing == name) {
            self.modules.push((name, source.into()));
        }
    }

    /// Queue a stored snippet to run before the caller's snippet.
    pub fn preload(&mut self, name: impl Into<String>, code: impl Into<String>) {
        self.preloads.push((name.into(), code.into()));
    }

    /// Bindings in evaluation order.
    #[must_use]
    pub fn bindings(&self) -> &[NamespaceBinding] {
        &self.bindings
    }

    /// Binding expression by name.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&PyExpr> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.expr)
    }

    /// True when `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    /// Bound names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    /// `(variable, secret)` pairs to place in the interpreter environment.
    #[must_use]
    pub fn secret_env(&self) -> &[(String, Secret)] {
        &self.secrets
    }

    /// Plain variables to place in the interpreter environment.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Shipped modules as `(name, source)`.
    #[must_use]
    pub fn modules(&self) -> &[(String, String)] {
        &self.modules
    }

    /// Queued stored snippets.
    #[must_use]
    pub fn preloads(&self) -> &[(String, String)] {
        &self.preloads
    }
}

/// Options that change what a factory binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Bind helper objects (`aws`, `cost`, `monitoring`).
    pub helpers: bool,
    /// Preload every stored snippet before the caller's snippet.
    pub preload_stored: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            helpers: true,
            preload_stored: false,
        }
    }
}

/// Builds the namespace for one backend.
#[async_trait]
pub trait NamespaceFactory: Send + Sync {
    /// Backend served.
    fn backend(&self) -> Backend;

    /// Resolve credentials and describe the namespace. The bundle is
    /// consumed so its secrets are dropped when resolution finishes.
    ///
    /// # Errors
    ///
    /// [`CredentialError`] when required credential material is missing.
    async fn build(
        &self,
        credentials: Option<CredentialBundle>,
        options: &BuildOptions,
    ) -> Result<ExecutionNamespace, CredentialError>;
}

/// Reject a bundle meant for another backend.
pub(crate) fn check_bundle_backend(
    expected: Backend,
    credentials: Option<&CredentialBundle>,
) -> Result<(), CredentialError> {
    match credentials {
        Some(bundle) if bundle.backend() != expected => Err(CredentialError::BackendMismatch {
            expected,
            actual: bundle.backend(),
        }),
        _ => Ok(()),
    }
}

/// Backend → factory lookup.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<Backend, Arc<dyn NamespaceFactory>>,
}

impl FactoryRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factories for every enabled backend.
    #[must_use]
    pub fn with_defaults(sources: &CredentialSources, config: &BackendsConfig) -> Self {
        let mut registry = Self::new();
        for backend in &config.enabled {
            let factory: Arc<dyn NamespaceFactory> = match backend {
                Backend::Aws => Arc::new(AwsNamespaceFactory::new(
                    sources.clone(),
                    config.aws_default_region.clone(),
                    config.helper_module.clone(),
                )),
                Backend::Azure => Arc::new(AzureNamespaceFactory::new(sources.clone())),
                Backend::Hetzner => Arc::new(HetznerNamespaceFactory::new(sources.clone())),
            };
            registry.register(factory);
        }
        registry
    }

    /// Add or replace the factory for its backend.
    pub fn register(&mut self, factory: Arc<dyn NamespaceFactory>) -> &mut Self {
        self.factories.insert(factory.backend(), factory);
        self
    }

    /// Factory for `backend`.
    #[must_use]
    pub fn get(&self, backend: Backend) -> Option<Arc<dyn NamespaceFactory>> {
        self.factories.get(&backend).cloned()
    }

    /// Registered backends.
    #[must_use]
    pub fn backends(&self) -> Vec<Backend> {
        let mut backends: Vec<_> = self.factories.keys().copied().collect();
        backends.sort_by_key(|b| b.as_str());
        backends
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_wraps_into_call() {
        let expr = PyExpr::from_import("hcloud", "Client").kwarg("token", PyExpr::str("t"));
        assert_eq!(
            expr,
            PyExpr::Call {
                callee: Box::new(PyExpr::from_import("hcloud", "Client")),
                args: vec![],
                kwargs: vec![("token".to_string(), PyExpr::str("t"))],
            }
        );
    }

    #[test]
    fn test_secrets_get_distinct_variables() {
        let mut ns = ExecutionNamespace::new(Backend::Aws);
        let a = ns.secret(Secret::new("one"));
        let b = ns.secret(Secret::new("two"));
        assert_eq!(a, PyExpr::Secret("CLOUDOPS_SECRET_0".to_string()));
        assert_eq!(b, PyExpr::Secret("CLOUDOPS_SECRET_1".to_string()));
        assert_eq!(ns.secret_env()[1].1.expose(), "two");
    }

    #[test]
    fn test_rebinding_keeps_position() {
        let mut ns = ExecutionNamespace::new(Backend::Hetzner);
        ns.bind_common_modules();
        ns.bind("json", PyExpr::module("simplejson"));
        assert_eq!(
            ns.names().collect::<Vec<_>>(),
            vec!["json", "datetime", "timedelta"]
        );
        assert_eq!(ns.binding("json"), Some(&PyExpr::module("simplejson")));
    }
}
