//! cloudops CLI: serve the MCP tools over stdio or HTTP, or vet a snippet.
//!
//! Logging goes to stderr; set `RUST_LOG=cloudops=debug` for details.

mod cli;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cloudops_server::{
    CloudOpsService, CloudOpsSettings, load_settings, run_http, run_stdio,
    set_config_home_override, tool_definitions,
};
use cloudops_vetter::SnippetVetter;

use crate::cli::{Cli, Command, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "cloudops=debug"
        } else {
            "cloudops=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut settings = load_settings();

    match cli.command {
        Command::Serve {
            transport,
            bind,
            timeout,
            store_path,
            max_snippets,
            no_store,
            max_concurrent,
        } => {
            if timeout.is_some() {
                settings.executor.default_timeout_secs = timeout;
                settings.remote.command_timeout_secs = timeout;
            }
            if store_path.is_some() {
                settings.store.path = store_path;
            }
            if max_snippets.is_some() {
                settings.store.max_entries = max_snippets;
            }
            if no_store {
                settings.store.enabled = Some(false);
            }
            if max_concurrent.is_some() {
                settings.server.max_concurrent = max_concurrent;
            }
            serve(&settings, transport, bind).await
        }
        Command::Check { path } => check(&settings, path.as_deref()),
        Command::Tools => {
            let tools = serde_json::to_string_pretty(&tool_definitions())?;
            println!("{tools}");
            Ok(())
        }
    }
}

async fn serve(settings: &CloudOpsSettings, transport: Transport, bind: Option<String>) -> Result<()> {
    let service =
        CloudOpsService::from_settings(settings).context("failed to initialize cloudops")?;
    tracing::info!(?service, "cloudops ready");
    match transport {
        Transport::Stdio => run_stdio(service).await,
        Transport::Http => {
            let bind = bind.unwrap_or_else(|| settings.bind());
            run_http(service, &bind).await
        }
    }
}

fn check(settings: &CloudOpsSettings, path: Option<&std::path::Path>) -> Result<()> {
    let source = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let vetter = SnippetVetter::with_config(settings.vetter_config());
    match vetter.vet(&source) {
        Ok(_) => {
            println!("ok");
            Ok(())
        }
        Err(e) => anyhow::bail!("{e}"),
    }
}
