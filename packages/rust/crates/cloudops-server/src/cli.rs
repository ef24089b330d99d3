use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cloudops")]
#[command(about = "Credential-scoped cloud snippet execution and SSH commands as MCP tools.")]
pub(crate) struct Cli {
    /// Override config directory (reads `<DIR>/cloudops/settings.yaml`).
    #[arg(long, global = true)]
    pub(crate) conf: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum Transport {
    #[default]
    Stdio,
    Http,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the MCP tools.
    Serve {
        #[arg(long, value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,

        /// Listen address for `--transport http` (default from settings, else 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,

        /// Default snippet timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Snippet store file
        #[arg(long)]
        store_path: Option<PathBuf>,

        /// Snippet store capacity
        #[arg(long)]
        max_snippets: Option<usize>,

        /// Disable the snippet store tools
        #[arg(long)]
        no_store: bool,

        /// Max concurrent executions (0 = unlimited)
        #[arg(long)]
        max_concurrent: Option<usize>,
    },
    /// Vet a snippet (file or stdin) without running it.
    Check {
        /// Snippet file; reads stdin when omitted
        path: Option<PathBuf>,
    },
    /// Print the tool definitions as JSON.
    Tools,
}
