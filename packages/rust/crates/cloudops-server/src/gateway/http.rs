//! HTTP gateway: `/mcp` (streamable MCP) and `/health`.
//!
//! Graceful shutdown on Ctrl+C and SIGTERM; in-flight requests complete before exit.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, routing::get};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::CloudOpsService;

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backends: Vec<String>,
    pub protocols: Vec<&'static str>,
    pub snippet_store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<usize>,
}

impl HealthResponse {
    fn of(service: &CloudOpsService) -> Self {
        Self {
            status: "alive",
            version: env!("CARGO_PKG_VERSION"),
            backends: service
                .backends()
                .into_iter()
                .map(|b| b.as_str().to_string())
                .collect(),
            protocols: vec!["ssh"],
            snippet_store: service.has_store(),
            max_concurrent: service.max_concurrent(),
            in_flight: service.in_flight(),
        }
    }
}

async fn handle_health(State(service): State<CloudOpsService>) -> Json<HealthResponse> {
    Json(HealthResponse::of(&service))
}

/// Build the router. MCP sessions end when `ct` is cancelled.
pub fn router(service: CloudOpsService, ct: &CancellationToken) -> Router {
    let mcp_service = service.clone();
    let mcp = StreamableHttpService::new(
        move || Ok(mcp_service.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: None,
            cancellation_token: ct.child_token(),
            ..Default::default()
        },
    );
    Router::new()
        .route("/health", get(handle_health))
        .with_state(service)
        .nest_service("/mcp", mcp)
}

/// Serve on `bind_addr` (e.g. `127.0.0.1:8080`) until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Bind or accept failure.
pub async fn run_http(service: CloudOpsService, bind_addr: &str) -> Result<()> {
    let ct = CancellationToken::new();
    let max = service
        .max_concurrent()
        .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
    let app = router(service, &ct);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(
        "listening on {bind_addr} (mcp=/mcp, health=/health, max_concurrent={max}, Ctrl+C/SIGTERM to stop)"
    );
    let shutdown = ct.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}
