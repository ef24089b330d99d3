//! Request orchestration: vet, build namespace, preload, run.

use std::sync::Arc;
use std::time::Duration;

use cloudops_store::SnippetStore;
use cloudops_types::{Backend, ExecutionResult, Failure, FailureKind, ToolResponse};
use cloudops_vetter::SnippetVetter;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::credentials::CredentialBundle;
use crate::executor::SnippetRunner;
use crate::namespace::{BuildOptions, ExecutionNamespace, FactoryRegistry};

/// One local snippet execution request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Caller snippet, before vetting.
    pub snippet: String,
    /// Namespace backend.
    pub backend: Backend,
    /// Per-request credentials.
    pub credentials: Option<CredentialBundle>,
    /// Override of the default bound.
    pub timeout: Option<Duration>,
    /// Namespace options.
    pub options: BuildOptions,
}

impl ExecutionRequest {
    /// Request with default options and no credentials.
    pub fn new(backend: Backend, snippet: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            backend,
            credentials: None,
            timeout: None,
            options: BuildOptions::default(),
        }
    }

    /// Attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialBundle) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override namespace options.
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Normalized outcome.
    pub result: ExecutionResult,
    /// Stored snippets loaded before the caller snippet; `None` when
    /// preloading was not requested.
    pub functions_available: Option<Vec<String>>,
}

impl From<ExecutionResult> for ExecutionReport {
    fn from(result: ExecutionResult) -> Self {
        Self {
            result,
            functions_available: None,
        }
    }
}

impl From<Failure> for ExecutionReport {
    fn from(failure: Failure) -> Self {
        ExecutionResult::Failure(failure).into()
    }
}

impl From<ExecutionReport> for ToolResponse {
    fn from(report: ExecutionReport) -> Self {
        let response = ToolResponse::from(report.result);
        match report.functions_available {
            Some(names) => response.with_functions_available(names),
            None => response,
        }
    }
}

/// Local snippet execution engine.
pub struct ExecutionEngine {
    vetter: Arc<SnippetVetter>,
    registry: FactoryRegistry,
    runner: Arc<dyn SnippetRunner>,
    store: Option<Arc<dyn SnippetStore>>,
    config: ExecutorConfig,
}

impl ExecutionEngine {
    /// Engine without a snippet store.
    pub fn new(
        vetter: SnippetVetter,
        registry: FactoryRegistry,
        runner: Arc<dyn SnippetRunner>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            vetter: Arc::new(vetter),
            registry,
            runner,
            store: None,
            config,
        }
    }

    /// Attach the store used for preloading.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SnippetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Vetter in use.
    #[must_use]
    pub fn vetter(&self) -> &SnippetVetter {
        &self.vetter
    }

    /// Factory registry in use.
    #[must_use]
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one request end to end. Every failure is returned as a report.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionReport {
        let request_id = Uuid::new_v4();
        let span = info_span!("execute", %request_id, backend = %request.backend);
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, request: ExecutionRequest) -> ExecutionReport {
        let ExecutionRequest {
            snippet,
            backend,
            credentials,
            timeout,
            options,
        } = request;

        let vetted = match self.vetter.vet(&snippet) {
            Ok(vetted) => vetted,
            Err(e) => {
                warn!(error = %e, "snippet rejected");
                return Failure::from(e).into();
            }
        };
        drop(snippet);

        let Some(factory) = self.registry.get(backend) else {
            return Failure::new(
                FailureKind::Parameter,
                format!("Backend '{backend}' is not enabled"),
            )
            .into();
        };

        let mut namespace = match factory.build(credentials, &options).await {
            Ok(namespace) => namespace,
            Err(e) => {
                warn!(error = %e, "namespace build failed");
                return Failure::from(e).into();
            }
        };

        let functions_available = if options.preload_stored {
            Some(self.preload_stored(&mut namespace).await)
        } else {
            None
        };

        let timeout = self.config.effective_timeout(timeout);
        debug!(
            runner = self.runner.name(),
            timeout_secs = timeout.as_secs_f64(),
            bindings = namespace.bindings().len(),
            "dispatching snippet"
        );

        let runner = Arc::clone(&self.runner);
        let worker = tokio::spawn(async move { runner.run(vetted, namespace, timeout).await });
        let result = match worker.await {
            Ok(result) => result,
            Err(e) => Failure::new(
                FailureKind::Internal,
                format!("Execution worker failed: {e}"),
            )
            .into(),
        };

        match &result {
            ExecutionResult::Success(_) => info!("snippet completed"),
            ExecutionResult::Failure(failure) => {
                info!(error_type = %failure.error_type, "snippet failed");
            }
            ExecutionResult::Timeout { elapsed } => {
                info!(timeout_secs = elapsed.as_secs_f64(), "snippet timed out");
            }
        }

        ExecutionReport {
            result,
            functions_available,
        }
    }

    /// Vet and queue every stored snippet. Rejected ones are logged and
    /// skipped. Usage of the queued ones is recorded off the async workers.
    async fn preload_stored(&self, namespace: &mut ExecutionNamespace) -> Vec<String> {
        let Some(store) = &self.store else {
            warn!("preload requested but no snippet store is configured");
            return Vec::new();
        };
        let entries = match store.get_all_code() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to read stored snippets");
                return Vec::new();
            }
        };

        let mut loaded = Vec::with_capacity(entries.len());
        for (name, code) in entries {
            match self.vetter.vet_verbatim(&code) {
                Ok(vetted) => {
                    namespace.preload(name.as_str(), vetted.into_inner());
                    loaded.push(name);
                }
                Err(e) => warn!(snippet = %name, error = %e, "skipping stored snippet"),
            }
        }

        if !loaded.is_empty() {
            let store = Arc::clone(store);
            let names = loaded.clone();
            let span = Span::current();
            let recorded = tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                for name in &names {
                    if let Err(e) = store.record_usage(name) {
                        warn!(snippet = %name, error = %e, "failed to record usage");
                    }
                }
            })
            .await;
            if let Err(e) = recorded {
                warn!(error = %e, "usage recording worker failed");
            }
        }
        loaded
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("runner", &self.runner.name())
            .field("registry", &self.registry)
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
