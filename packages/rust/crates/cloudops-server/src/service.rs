//! MCP tool handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use cloudops_remote::{RemoteCommandRunner, RemoteRequest};
use cloudops_sandbox::{
    CredentialSources, ExecutionEngine, ExecutionRequest, FactoryRegistry, PythonProcessRunner,
};
use cloudops_store::{
    JsonSnippetStore, NewSnippet, SnippetEntry, SnippetFilter, SnippetStore, StoreError,
};
use cloudops_types::{Backend, FailureKind, ToolResponse};
use cloudops_vetter::SnippetVetter;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ErrorData, Implementation, JsonObject,
    ListToolsResult, PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::warn;

use crate::config::CloudOpsSettings;
use crate::tools::{
    AWS_EXECUTE, AZURE_EXECUTE, AwsExecuteArgs, AzureExecuteArgs, DELETE_SNIPPET,
    DeleteSnippetArgs, EXECUTE_WITH_SNIPPETS, ExecuteWithSnippetsArgs, HETZNER_EXECUTE,
    HetznerExecuteArgs, LIST_SNIPPETS, SAVE_SNIPPET, SSH_EXECUTE, SshExecuteArgs,
    tool_definitions,
};

const SERVER_NAME: &str = "cloudops";

/// Stored snippet as listed (code omitted).
#[derive(Debug, Clone, Serialize)]
pub struct SnippetSummary {
    /// Name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Category.
    pub category: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last preload.
    pub last_used: Option<String>,
    /// Preload count.
    pub usage_count: u64,
    /// Save count.
    pub version: u32,
}

impl From<SnippetEntry> for SnippetSummary {
    fn from(entry: SnippetEntry) -> Self {
        Self {
            name: entry.name,
            description: entry.description,
            tags: entry.tags,
            category: entry.category,
            created_at: entry.created_at.to_rfc3339(),
            last_used: entry.last_used.map(|t| t.to_rfc3339()),
            usage_count: entry.usage_count,
            version: entry.version,
        }
    }
}

/// `list_snippets` response.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetListing {
    /// Always true.
    pub success: bool,
    /// Matching snippets.
    pub snippets: Vec<SnippetSummary>,
    /// Number of matches.
    pub total: usize,
    /// Store capacity.
    pub limit: usize,
}

struct Inner {
    engine: ExecutionEngine,
    remote: RemoteCommandRunner,
    store: Option<Arc<dyn SnippetStore>>,
    store_limit: usize,
    limiter: Option<Semaphore>,
    max_concurrent: Option<usize>,
}

/// Tool surface shared by the stdio and HTTP transports.
#[derive(Clone)]
pub struct CloudOpsService {
    inner: Arc<Inner>,
}

/// Assembles a [`CloudOpsService`].
pub struct ServiceBuilder {
    engine: ExecutionEngine,
    remote: RemoteCommandRunner,
    store: Option<(Arc<dyn SnippetStore>, usize)>,
    max_concurrent: Option<usize>,
}

impl ServiceBuilder {
    /// Start from an engine and a remote runner.
    #[must_use]
    pub fn new(engine: ExecutionEngine, remote: RemoteCommandRunner) -> Self {
        Self {
            engine,
            remote,
            store: None,
            max_concurrent: None,
        }
    }

    /// Enable the snippet tools.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SnippetStore>, limit: usize) -> Self {
        self.store = Some((store, limit));
        self
    }

    /// Limit concurrent executions.
    #[must_use]
    pub fn max_concurrent(mut self, max: Option<usize>) -> Self {
        self.max_concurrent = max.filter(|n| *n > 0);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> CloudOpsService {
        let (engine, store, store_limit) = match self.store {
            Some((store, limit)) => (self.engine.with_store(Arc::clone(&store)), Some(store), limit),
            None => (self.engine, None, 0),
        };
        CloudOpsService {
            inner: Arc::new(Inner {
                engine,
                remote: self.remote,
                store,
                store_limit,
                limiter: self.max_concurrent.map(Semaphore::new),
                max_concurrent: self.max_concurrent,
            }),
        }
    }
}

impl CloudOpsService {
    /// Build every collaborator from settings.
    ///
    /// # Errors
    ///
    /// Invalid remote settings or an unreadable snippet file.
    pub fn from_settings(settings: &CloudOpsSettings) -> Result<Self> {
        let executor_config = settings.executor_config();
        let backends = settings.backends_config();
        let sources = CredentialSources::system(&backends);
        let registry = FactoryRegistry::with_defaults(&sources, &backends);
        let runner = match PythonProcessRunner::resolve(executor_config.clone()) {
            Ok(runner) => runner,
            Err(e) => {
                warn!(error = %e, "interpreter not resolved; executions will fail until it is installed");
                PythonProcessRunner::new(executor_config.clone())
            }
        };
        let engine = ExecutionEngine::new(
            SnippetVetter::with_config(settings.vetter_config()),
            registry,
            Arc::new(runner),
            executor_config,
        );
        let remote = RemoteCommandRunner::new(settings.remote_config()?);

        let mut builder =
            ServiceBuilder::new(engine, remote).max_concurrent(settings.server.max_concurrent);
        if let Some(store_config) = settings.store_config() {
            let limit = store_config.max_entries;
            let path = store_config.path.clone();
            let store = JsonSnippetStore::open(store_config).with_context(|| match &path {
                Some(path) => format!("failed to open snippet store {}", path.display()),
                None => "failed to open snippet store".to_string(),
            })?;
            builder = builder.store(Arc::new(store), limit);
        }
        Ok(builder.build())
    }

    /// Backends accepting requests.
    #[must_use]
    pub fn backends(&self) -> Vec<Backend> {
        self.inner.engine.registry().backends()
    }

    /// True when the snippet tools are available.
    #[must_use]
    pub fn has_store(&self) -> bool {
        self.inner.store.is_some()
    }

    /// Configured concurrency limit.
    #[must_use]
    pub fn max_concurrent(&self) -> Option<usize> {
        self.inner.max_concurrent
    }

    /// Executions currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> Option<usize> {
        let max = self.inner.max_concurrent?;
        let limiter = self.inner.limiter.as_ref()?;
        Some(max.saturating_sub(limiter.available_permits()))
    }

    async fn slot(&self) -> Option<SemaphorePermit<'_>> {
        match &self.inner.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        }
    }

    /// Run a local snippet.
    pub async fn execute(&self, request: ExecutionRequest) -> ToolResponse {
        let _slot = self.slot().await;
        self.inner.engine.execute(request).await.into()
    }

    /// Run a remote command.
    pub async fn ssh_execute(&self, request: RemoteRequest) -> ToolResponse {
        let _slot = self.slot().await;
        self.inner.remote.run(request).await.into()
    }

    /// `execute_with_snippets`.
    pub async fn execute_with_snippets(&self, request: ExecutionRequest) -> ToolResponse {
        if self.inner.store.is_none() {
            return store_disabled();
        }
        self.execute(request).await
    }

    /// `save_snippet`.
    pub async fn save_snippet(&self, snippet: NewSnippet) -> ToolResponse {
        let Some(store) = self.inner.store.clone() else {
            return store_disabled();
        };
        match blocking(move || store.save(snippet)).await {
            Ok(entry) => ToolResponse::ok(format!(
                "Snippet '{}' saved successfully (version {})",
                entry.name, entry.version
            )),
            Err(e) => store_failure(&e),
        }
    }

    /// `list_snippets`.
    pub async fn list_snippets(&self, filter: SnippetFilter) -> Result<SnippetListing, ToolResponse> {
        let Some(store) = self.inner.store.clone() else {
            return Err(store_disabled());
        };
        let entries = blocking(move || store.list(&filter))
            .await
            .map_err(|e| store_failure(&e))?;
        let snippets: Vec<SnippetSummary> = entries.into_iter().map(Into::into).collect();
        Ok(SnippetListing {
            success: true,
            total: snippets.len(),
            snippets,
            limit: self.inner.store_limit,
        })
    }

    /// `delete_snippet`.
    pub async fn delete_snippet(&self, name: String) -> ToolResponse {
        let Some(store) = self.inner.store.clone() else {
            return store_disabled();
        };
        let target = name.clone();
        match blocking(move || store.delete(&target)).await {
            Ok(true) => ToolResponse::ok(format!("Snippet '{name}' deleted successfully")),
            Ok(false) => store_failure(&StoreError::NotFound(name)),
            Err(e) => store_failure(&e),
        }
    }

    /// Run the tool `name` and return its JSON text. This is what `tools/call`
    /// answers with.
    ///
    /// # Errors
    ///
    /// Unknown tool or arguments that do not match its schema.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<String, ErrorData> {
        let response = match name {
            AWS_EXECUTE => self.execute(parse::<AwsExecuteArgs>(arguments)?.into()).await,
            AZURE_EXECUTE => self.execute(parse::<AzureExecuteArgs>(arguments)?.into()).await,
            HETZNER_EXECUTE => {
                self.execute(parse::<HetznerExecuteArgs>(arguments)?.into())
                    .await
            }
            SSH_EXECUTE => {
                self.ssh_execute(parse::<SshExecuteArgs>(arguments)?.into())
                    .await
            }
            EXECUTE_WITH_SNIPPETS => {
                self.execute_with_snippets(parse::<ExecuteWithSnippetsArgs>(arguments)?.into())
                    .await
            }
            SAVE_SNIPPET => self.save_snippet(parse(arguments)?).await,
            DELETE_SNIPPET => {
                self.delete_snippet(parse::<DeleteSnippetArgs>(arguments)?.name)
                    .await
            }
            LIST_SNIPPETS => {
                return Ok(match self.list_snippets(parse(arguments)?).await {
                    Ok(listing) => serde_json::to_string_pretty(&listing)
                        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?,
                    Err(response) => response.to_json(),
                });
            }
            other => {
                return Err(ErrorData::invalid_params(
                    format!("unknown tool '{other}'"),
                    None,
                ));
            }
        };
        Ok(response.to_json())
    }
}

impl std::fmt::Debug for CloudOpsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudOpsService")
            .field("backends", &self.backends())
            .field("store", &self.has_store())
            .field("max_concurrent", &self.inner.max_concurrent)
            .finish()
    }
}

impl ServerHandler for CloudOpsService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Credential-scoped cloud snippet execution (aws, azure, hetzner), one-shot SSH \
                 commands and a reusable snippet store. Every tool returns a JSON record with \
                 a success flag."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(tool_definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let text = self.call(&request.name, request.arguments).await?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

fn parse<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, ErrorData> {
    serde_json::from_value(serde_json::Value::Object(arguments.unwrap_or_default()))
        .map_err(|e| ErrorData::invalid_params(format!("invalid arguments: {e}"), None))
}

async fn blocking<T, F>(task: F) -> cloudops_store::Result<T>
where
    F: FnOnce() -> cloudops_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.unwrap_or_else(|e| {
        Err(StoreError::Persist {
            path: std::path::PathBuf::new(),
            source: std::io::Error::other(e.to_string()),
        })
    })
}

fn store_disabled() -> ToolResponse {
    ToolResponse::error(FailureKind::Parameter.tag(), "Snippet storage is disabled")
}

fn store_failure(err: &StoreError) -> ToolResponse {
    let kind = match err {
        StoreError::LimitReached { .. }
        | StoreError::InvalidName(_)
        | StoreError::Syntax { .. }
        | StoreError::NotFound(_) => FailureKind::Parameter,
        StoreError::Persist { .. } | StoreError::Corrupt { .. } | StoreError::Serialization(_) => {
            FailureKind::Internal
        }
    };
    warn!(error = %err, "snippet store operation failed");
    ToolResponse::error(kind.tag(), err.to_string())
}
