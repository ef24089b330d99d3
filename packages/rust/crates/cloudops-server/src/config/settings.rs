//! Runtime settings loader for cloudops.
//!
//! Loads and merges:
//! - System defaults: `<CLOUDOPS_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<CLOUDOPS_CONFIG_HOME>/cloudops/settings.yaml`
//!
//! Merge precedence is user over system. CLI flags are applied on top by the
//! binary.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Result, bail};
use cloudops_remote::{HostKeyPolicy, RemoteConfig};
use cloudops_sandbox::{BackendsConfig, ExecutorConfig};
use cloudops_store::StoreConfig;
use cloudops_types::Backend;
use cloudops_vetter::VetterConfig;
use serde::Deserialize;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "cloudops/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
/// Listen address when neither settings nor flags name one.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Every settings section. Unset fields fall back to library defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudOpsSettings {
    /// Bounded executor.
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Static vetter.
    #[serde(default)]
    pub vetter: VetterSettings,
    /// Namespace factories.
    #[serde(default)]
    pub backends: BackendSettings,
    /// SSH runner.
    #[serde(default)]
    pub remote: RemoteSettings,
    /// Snippet store.
    #[serde(default)]
    pub store: StoreSettings,
    /// Tool server.
    #[serde(default)]
    pub server: ServerSettings,
}

/// `executor:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorSettings {
    pub interpreter: Option<PathBuf>,
    pub interpreter_args: Option<Vec<String>>,
    pub default_timeout_secs: Option<u64>,
    pub max_timeout_secs: Option<u64>,
    pub env_passthrough: Option<Vec<String>>,
}

/// `vetter:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VetterSettings {
    pub denied_calls: Option<Vec<String>>,
    pub unescape_literals: Option<bool>,
}

/// `backends:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendSettings {
    pub enabled: Option<Vec<Backend>>,
    pub aws_default_region: Option<String>,
    /// An empty string disables helper objects.
    pub helper_module: Option<String>,
    pub aws_credentials_file: Option<PathBuf>,
    pub aws_config_file: Option<PathBuf>,
    pub profile_dir: Option<PathBuf>,
    pub aws_cli: Option<PathBuf>,
    pub role_session_duration_secs: Option<u64>,
}

/// `remote:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSettings {
    pub connect_timeout_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub max_command_timeout_secs: Option<u64>,
    /// `accept` or `known_hosts`.
    pub host_key_policy: Option<String>,
    pub known_hosts_path: Option<PathBuf>,
    pub extra_denied_patterns: Option<Vec<String>>,
}

/// `store:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    pub enabled: Option<bool>,
    pub path: Option<PathBuf>,
    pub max_entries: Option<usize>,
}

/// `server:` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    pub bind: Option<String>,
    pub max_concurrent: Option<usize>,
}

impl CloudOpsSettings {
    /// Overlay wins field by field.
    #[must_use]
    pub fn merge(self, overlay: Self) -> Self {
        Self {
            executor: self.executor.merge(overlay.executor),
            vetter: self.vetter.merge(overlay.vetter),
            backends: self.backends.merge(overlay.backends),
            remote: self.remote.merge(overlay.remote),
            store: self.store.merge(overlay.store),
            server: self.server.merge(overlay.server),
        }
    }

    /// Executor configuration.
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        let s = &self.executor;
        let defaults = ExecutorConfig::default();
        ExecutorConfig {
            interpreter: s.interpreter.clone().unwrap_or(defaults.interpreter),
            interpreter_args: s
                .interpreter_args
                .clone()
                .unwrap_or(defaults.interpreter_args),
            default_timeout_secs: s
                .default_timeout_secs
                .unwrap_or(defaults.default_timeout_secs),
            max_timeout_secs: s.max_timeout_secs.unwrap_or(defaults.max_timeout_secs),
            env_passthrough: s
                .env_passthrough
                .clone()
                .unwrap_or(defaults.env_passthrough),
        }
    }

    /// Vetter configuration.
    #[must_use]
    pub fn vetter_config(&self) -> VetterConfig {
        let mut config = VetterConfig::default();
        if let Some(names) = &self.vetter.denied_calls {
            config = config.with_denied_calls(names.iter().cloned());
        }
        if let Some(enabled) = self.vetter.unescape_literals {
            config = config.with_unescape_literals(enabled);
        }
        config
    }

    /// Namespace factory configuration.
    #[must_use]
    pub fn backends_config(&self) -> BackendsConfig {
        let s = &self.backends;
        let defaults = BackendsConfig::default();
        BackendsConfig {
            enabled: s.enabled.clone().unwrap_or(defaults.enabled),
            aws_default_region: s
                .aws_default_region
                .clone()
                .unwrap_or(defaults.aws_default_region),
            helper_module: match &s.helper_module {
                Some(module) if module.trim().is_empty() => None,
                Some(module) => Some(module.clone()),
                None => defaults.helper_module,
            },
            aws_credentials_file: s.aws_credentials_file.clone(),
            aws_config_file: s.aws_config_file.clone(),
            profile_dir: s.profile_dir.clone(),
            aws_cli: s.aws_cli.clone().unwrap_or(defaults.aws_cli),
            role_session_duration_secs: s
                .role_session_duration_secs
                .unwrap_or(defaults.role_session_duration_secs),
        }
    }

    /// SSH runner configuration.
    ///
    /// # Errors
    ///
    /// Unknown host key policy, or `known_hosts` without a resolvable path.
    pub fn remote_config(&self) -> Result<RemoteConfig> {
        let s = &self.remote;
        let defaults = RemoteConfig::default();
        let host_key_policy = match s.host_key_policy.as_deref().map(str::trim) {
            None | Some("accept") => HostKeyPolicy::Accept,
            Some("known_hosts") => {
                let path = match &s.known_hosts_path {
                    Some(path) => path.clone(),
                    None => match dirs::home_dir() {
                        Some(home) => home.join(".ssh/known_hosts"),
                        None => bail!(
                            "remote.known_hosts_path is required when no home directory is known"
                        ),
                    },
                };
                HostKeyPolicy::KnownHosts(path)
            }
            Some(other) => {
                bail!("unknown remote.host_key_policy '{other}' (expected accept or known_hosts)")
            }
        };
        Ok(RemoteConfig {
            connect_timeout_secs: s
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            command_timeout_secs: s
                .command_timeout_secs
                .unwrap_or(defaults.command_timeout_secs),
            max_command_timeout_secs: s
                .max_command_timeout_secs
                .unwrap_or(defaults.max_command_timeout_secs),
            host_key_policy,
            extra_denied_patterns: s.extra_denied_patterns.clone().unwrap_or_default(),
        })
    }

    /// Store configuration, `None` when the store is disabled.
    #[must_use]
    pub fn store_config(&self) -> Option<StoreConfig> {
        if self.store.enabled == Some(false) {
            return None;
        }
        let mut config = StoreConfig::default();
        if let Some(path) = &self.store.path {
            config = config.with_path(path.clone());
        }
        if let Some(max) = self.store.max_entries {
            config = config.with_max_entries(max);
        }
        Some(config)
    }

    /// Listen address.
    #[must_use]
    pub fn bind(&self) -> String {
        self.server
            .bind
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }
}

impl ExecutorSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            interpreter: overlay.interpreter.or(self.interpreter),
            interpreter_args: overlay.interpreter_args.or(self.interpreter_args),
            default_timeout_secs: overlay.default_timeout_secs.or(self.default_timeout_secs),
            max_timeout_secs: overlay.max_timeout_secs.or(self.max_timeout_secs),
            env_passthrough: overlay.env_passthrough.or(self.env_passthrough),
        }
    }
}

impl VetterSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            denied_calls: overlay.denied_calls.or(self.denied_calls),
            unescape_literals: overlay.unescape_literals.or(self.unescape_literals),
        }
    }
}

impl BackendSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            enabled: overlay.enabled.or(self.enabled),
            aws_default_region: overlay.aws_default_region.or(self.aws_default_region),
            helper_module: overlay.helper_module.or(self.helper_module),
            aws_credentials_file: overlay.aws_credentials_file.or(self.aws_credentials_file),
            aws_config_file: overlay.aws_config_file.or(self.aws_config_file),
            profile_dir: overlay.profile_dir.or(self.profile_dir),
            aws_cli: overlay.aws_cli.or(self.aws_cli),
            role_session_duration_secs: overlay
                .role_session_duration_secs
                .or(self.role_session_duration_secs),
        }
    }
}

impl RemoteSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            connect_timeout_secs: overlay.connect_timeout_secs.or(self.connect_timeout_secs),
            command_timeout_secs: overlay.command_timeout_secs.or(self.command_timeout_secs),
            max_command_timeout_secs: overlay
                .max_command_timeout_secs
                .or(self.max_command_timeout_secs),
            host_key_policy: overlay.host_key_policy.or(self.host_key_policy),
            known_hosts_path: overlay.known_hosts_path.or(self.known_hosts_path),
            extra_denied_patterns: overlay
                .extra_denied_patterns
                .or(self.extra_denied_patterns),
        }
    }
}

impl StoreSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            enabled: overlay.enabled.or(self.enabled),
            path: overlay.path.or(self.path),
            max_entries: overlay.max_entries.or(self.max_entries),
        }
    }
}

impl ServerSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            bind: overlay.bind.or(self.bind),
            max_concurrent: overlay.max_concurrent.or(self.max_concurrent),
        }
    }
}

/// Load system then user settings.
#[must_use]
pub fn load_settings() -> CloudOpsSettings {
    let (system_path, user_path) = settings_paths();
    load_settings_from_paths(&system_path, &user_path)
}

#[doc(hidden)]
#[must_use]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
#[must_use]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> CloudOpsSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> CloudOpsSettings {
    if !path.exists() {
        return CloudOpsSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return CloudOpsSettings::default();
        }
    };
    match serde_yaml::from_str::<CloudOpsSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            CloudOpsSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    non_empty_env("CLOUDOPS_ROOT").map_or_else(
        || std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        PathBuf::from,
    )
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `CLOUDOPS_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }
    if let Some(configured) = non_empty_env("CLOUDOPS_CONFIG_HOME") {
        return absolutize(project_root, PathBuf::from(configured));
    }
    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return absolutize(project_root, PathBuf::from(xdg));
    }
    match dirs::home_dir() {
        Some(home) => home.join(DEFAULT_CONFIG_HOME_RELATIVE_PATH),
        None => project_root.join(DEFAULT_CONFIG_HOME_RELATIVE_PATH),
    }
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_match_library_defaults() {
        let settings = CloudOpsSettings::default();
        assert_eq!(settings.executor_config(), ExecutorConfig::default());
        assert_eq!(settings.vetter_config(), VetterConfig::default());
        assert_eq!(settings.backends_config(), BackendsConfig::default());
        assert_eq!(settings.remote_config().unwrap(), RemoteConfig::default());
        assert_eq!(settings.store_config(), Some(StoreConfig::default()));
        assert_eq!(settings.bind(), DEFAULT_BIND);
    }

    #[test]
    fn test_blank_helper_module_disables_helpers() {
        let settings: CloudOpsSettings =
            serde_yaml::from_str("backends:\n  helper_module: \"\"\n").unwrap();
        assert_eq!(settings.backends_config().helper_module, None);
    }

    #[test]
    fn test_unknown_host_key_policy_is_rejected() {
        let settings: CloudOpsSettings =
            serde_yaml::from_str("remote:\n  host_key_policy: trust_me\n").unwrap();
        let err = settings.remote_config().unwrap_err();
        assert!(err.to_string().contains("trust_me"));
    }

    #[test]
    fn test_known_hosts_defaults_to_home_directory() {
        let settings: CloudOpsSettings =
            serde_yaml::from_str("remote:\n  host_key_policy: known_hosts\n").unwrap();
        let Some(home) = dirs::home_dir() else { return };
        assert_eq!(
            settings.remote_config().unwrap().host_key_policy,
            HostKeyPolicy::KnownHosts(home.join(".ssh/known_hosts"))
        );

        let settings: CloudOpsSettings = serde_yaml::from_str(
            "remote:\n  host_key_policy: known_hosts\n  known_hosts_path: /etc/ssh/ssh_known_hosts\n",
        )
        .unwrap();
        assert_eq!(
            settings.remote_config().unwrap().host_key_policy,
            HostKeyPolicy::KnownHosts(PathBuf::from("/etc/ssh/ssh_known_hosts"))
        );
    }

    #[test]
    fn test_disabled_store_has_no_config() {
        let settings: CloudOpsSettings =
            serde_yaml::from_str("store:\n  enabled: false\n  max_entries: 5\n").unwrap();
        assert_eq!(settings.store_config(), None);
    }
}
