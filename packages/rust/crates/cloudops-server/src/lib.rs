//! CloudOps tool server.
//!
//! Exposes the cloud snippet executors, the SSH runner and the snippet store
//! as MCP tools over stdio or streamable HTTP. Every tool answers with the
//! JSON record produced by [`cloudops_types::ToolResponse`].

#![allow(missing_docs)]

pub mod config;
pub mod gateway;
mod service;
pub mod tools;

pub use config::{CloudOpsSettings, load_settings, load_settings_from_paths, set_config_home_override};
pub use gateway::{HealthResponse, router, run_http, run_stdio};
pub use service::{CloudOpsService, ServiceBuilder, SnippetListing, SnippetSummary};
pub use tools::tool_definitions;
