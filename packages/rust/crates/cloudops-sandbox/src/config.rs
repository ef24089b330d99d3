//! Executor and backend configuration.

use std::path::PathBuf;
use std::time::Duration;

use cloudops_types::Backend;
use serde::Deserialize;

use crate::namespace::BUILTIN_HELPER_MODULE;

/// Default execution bound.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Upper bound for per-request overrides.
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Variables copied from the service environment into the interpreter.
pub const DEFAULT_ENV_PASSTHROUGH: [&str; 9] = [
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "TMPDIR",
    "PYTHONPATH",
    "SSL_CERT_FILE",
    "REQUESTS_CA_BUNDLE",
    "VIRTUAL_ENV",
];

/// Bounded executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Interpreter executable (resolved through `PATH`).
    pub interpreter: PathBuf,
    /// Extra interpreter flags placed before the program argument.
    pub interpreter_args: Vec<String>,
    /// Bound applied when a request does not set one.
    pub default_timeout_secs: u64,
    /// Requests asking for more are clamped to this.
    pub max_timeout_secs: u64,
    /// Environment variables inherited by the interpreter.
    pub env_passthrough: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            interpreter_args: vec!["-B".to_string()],
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_timeout_secs: MAX_TIMEOUT_SECS,
            env_passthrough: DEFAULT_ENV_PASSTHROUGH
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ExecutorConfig {
    /// Use another interpreter.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Set the default bound.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the override ceiling.
    #[must_use]
    pub fn with_max_timeout(mut self, timeout: Duration) -> Self {
        self.max_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Bound applied when none is requested.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Effective bound for a request: the override (or default), capped.
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let ceiling = Duration::from_secs(self.max_timeout_secs.max(self.default_timeout_secs));
        requested
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| self.default_timeout())
            .min(ceiling)
    }
}

/// Namespace factory settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Backends that accept requests.
    pub enabled: Vec<Backend>,
    /// Region used when nothing else names one.
    pub aws_default_region: String,
    /// Module providing `AWSHelpers`, `CostUtils` and `MonitoringUtils`.
    pub helper_module: Option<String>,
    /// Overrides `~/.aws/credentials`.
    pub aws_credentials_file: Option<PathBuf>,
    /// Overrides `~/.aws/config`.
    pub aws_config_file: Option<PathBuf>,
    /// Directory holding `azure.ini` and `hetzner.ini`; defaults to
    /// `~/.config/cloudops`.
    pub profile_dir: Option<PathBuf>,
    /// AWS CLI used for role assumption.
    pub aws_cli: PathBuf,
    /// Lifetime requested for assumed-role sessions.
    pub role_session_duration_secs: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            enabled: Backend::ALL.to_vec(),
            aws_default_region: "us-east-1".to_string(),
            helper_module: Some(BUILTIN_HELPER_MODULE.to_string()),
            aws_credentials_file: None,
            aws_config_file: None,
            profile_dir: None,
            aws_cli: PathBuf::from("aws"),
            role_session_duration_secs: 3600,
        }
    }
}
