//! Shared fixtures: a recording runner and service constructors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cloudops_remote::{RemoteCommandRunner, RemoteConfig};
use cloudops_sandbox::credentials::{
    AwsKeys, MapEnv, MemoryProfileSource, RoleAssumer, RoleBase,
};
use cloudops_sandbox::{
    BackendsConfig, CredentialError, CredentialSources, ExecutionEngine, ExecutionNamespace,
    ExecutorConfig, FactoryRegistry, SnippetRunner,
};
use cloudops_server::{CloudOpsService, ServiceBuilder};
use cloudops_store::JsonSnippetStore;
use cloudops_types::ExecutionResult;
use cloudops_vetter::{SnippetVetter, VettedSnippet};
use serde_json::Value;
use tokio::sync::Notify;

struct NoRoles;

#[async_trait]
impl RoleAssumer for NoRoles {
    async fn assume_role(
        &self,
        _base: RoleBase<'_>,
        role_arn: &str,
        _region: &str,
    ) -> Result<AwsKeys, CredentialError> {
        Err(CredentialError::RoleAssumption(format!("unexpected role {role_arn}")))
    }
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub code: String,
    pub secrets: Vec<String>,
    pub preloads: Vec<String>,
}

/// Records each run; optionally parks until released.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Seen>>,
    pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl RecordingRunner {
    pub fn gated(started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((started, release)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Seen {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl SnippetRunner for RecordingRunner {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(
        &self,
        snippet: VettedSnippet,
        namespace: ExecutionNamespace,
        _timeout: Duration,
    ) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Seen {
            code: snippet.as_str().to_string(),
            secrets: namespace
                .secret_env()
                .iter()
                .map(|(_, s)| s.expose().to_string())
                .collect(),
            preloads: namespace.preloads().iter().map(|(n, _)| n.clone()).collect(),
        });
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        ExecutionResult::success("done", "")
    }
}

pub fn engine(runner: Arc<RecordingRunner>) -> ExecutionEngine {
    let sources = CredentialSources::new(
        Arc::new(MapEnv::new().with("HCLOUD_API_TOKEN", "env-token")),
        Arc::new(MemoryProfileSource::new()),
        Arc::new(NoRoles),
    );
    let registry = FactoryRegistry::with_defaults(&sources, &BackendsConfig::default());
    ExecutionEngine::new(
        SnippetVetter::new(),
        registry,
        runner,
        ExecutorConfig::default(),
    )
}

pub fn builder(runner: Arc<RecordingRunner>) -> ServiceBuilder {
    ServiceBuilder::new(
        engine(runner),
        RemoteCommandRunner::new(RemoteConfig::default()),
    )
}

pub fn service_with_store(runner: Arc<RecordingRunner>, max_entries: usize) -> CloudOpsService {
    builder(runner)
        .store(Arc::new(JsonSnippetStore::in_memory(max_entries)), max_entries)
        .build()
}

pub async fn call(service: &CloudOpsService, name: &str, args: Value) -> Value {
    let Value::Object(map) = args else {
        panic!("arguments must be an object");
    };
    let text = service.call(name, Some(map)).await.unwrap();
    serde_json::from_str(&text).unwrap()
}
