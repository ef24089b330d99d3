//! Stdio gateway: one MCP session over stdin/stdout until the client disconnects.

use anyhow::{Context, Result};
use rmcp::ServiceExt;

use crate::CloudOpsService;

/// Serve a single client on stdio. Logs must go to stderr.
///
/// # Errors
///
/// Handshake or transport failure.
pub async fn run_stdio(service: CloudOpsService) -> Result<()> {
    tracing::info!("serving MCP on stdio");
    let running = service
        .serve(rmcp::transport::stdio())
        .await
        .context("MCP handshake on stdio failed")?;
    let reason = running.waiting().await.context("stdio session failed")?;
    tracing::info!(?reason, "stdio session closed");
    Ok(())
}
