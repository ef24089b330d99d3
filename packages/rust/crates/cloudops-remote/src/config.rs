//! Remote runner settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default TCP connect + handshake bound.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Default command bound.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
/// Ceiling for per-request command bounds.
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 300;
/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;
/// Default login user.
pub const DEFAULT_USER: &str = "root";

/// How unknown host keys are handled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "path")]
pub enum HostKeyPolicy {
    /// Accept whatever key the host presents.
    #[default]
    Accept,
    /// Require a matching entry in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

/// Remote runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Bound for connect, handshake and authentication.
    pub connect_timeout_secs: u64,
    /// Command bound when the request does not set one.
    pub command_timeout_secs: u64,
    /// Requests asking for more are clamped to this.
    pub max_command_timeout_secs: u64,
    /// Host key verification.
    pub host_key_policy: HostKeyPolicy,
    /// Patterns added to the built-in destructive-command list.
    pub extra_denied_patterns: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            max_command_timeout_secs: MAX_COMMAND_TIMEOUT_SECS,
            host_key_policy: HostKeyPolicy::default(),
            extra_denied_patterns: Vec::new(),
        }
    }
}

impl RemoteConfig {
    /// Set the connect bound.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the default command bound.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the host key policy.
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Connect bound.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Effective command bound for a request.
    #[must_use]
    pub fn command_timeout(&self, requested: Option<Duration>) -> Duration {
        let ceiling =
            Duration::from_secs(self.max_command_timeout_secs.max(self.command_timeout_secs));
        requested
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(self.command_timeout_secs))
            .min(ceiling)
    }
}
