//! Named credential profiles.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use cloudops_types::Backend;
use tracing::debug;

use crate::error::CredentialError;

/// Key/value pairs of one profile section.
pub type Profile = BTreeMap<String, String>;

/// Source of named profiles.
pub trait ProfileSource: Send + Sync {
    /// Look up `name` for `backend`. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// The backing store exists but cannot be read.
    fn profile(&self, backend: Backend, name: &str) -> Result<Option<Profile>, CredentialError>;

    /// Environment a consumer outside this process (the SDK, the CLI) needs
    /// to find the same profiles.
    fn env_hints(&self, _backend: Backend) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// INI-file profiles.
///
/// An AWS profile exists when either the shared credentials file has a
/// `[NAME]` section or the shared config file has `[profile NAME]` (or
/// `[default]`); credentials-file values win over config-file values.
/// Other backends read `<profile_dir>/<backend>.ini`.
#[derive(Debug, Clone)]
pub struct IniProfileSource {
    aws_credentials: PathBuf,
    aws_config: PathBuf,
    profile_dir: PathBuf,
}

impl IniProfileSource {
    /// Explicit file locations.
    #[must_use]
    pub fn new(aws_credentials: PathBuf, aws_config: PathBuf, profile_dir: PathBuf) -> Self {
        Self {
            aws_credentials,
            aws_config,
            profile_dir,
        }
    }

    /// Conventional locations under `home`, each overridable.
    #[must_use]
    pub fn from_home(
        home: &Path,
        aws_credentials: Option<PathBuf>,
        aws_config: Option<PathBuf>,
        profile_dir: Option<PathBuf>,
    ) -> Self {
        Self::new(
            aws_credentials.unwrap_or_else(|| home.join(".aws").join("credentials")),
            aws_config.unwrap_or_else(|| home.join(".aws").join("config")),
            profile_dir.unwrap_or_else(|| home.join(".config").join("cloudops")),
        )
    }

    fn read_section(path: &Path, section: &str) -> Result<Option<Profile>, CredentialError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|e| CredentialError::ProfileSource {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(parse_ini(&text).remove(section))
    }
}

impl ProfileSource for IniProfileSource {
    fn profile(&self, backend: Backend, name: &str) -> Result<Option<Profile>, CredentialError> {
        debug!(%backend, profile = name, "looking up profile");
        match backend {
            Backend::Aws => {
                let credentials = Self::read_section(&self.aws_credentials, name)?;
                let config_section = if name == "default" {
                    "default".to_string()
                } else {
                    format!("profile {name}")
                };
                let config = Self::read_section(&self.aws_config, &config_section)?;
                Ok(match (credentials, config) {
                    (None, None) => None,
                    (Some(profile), None) | (None, Some(profile)) => Some(profile),
                    (Some(mut profile), Some(config)) => {
                        for (key, value) in config {
                            profile.entry(key).or_insert(value);
                        }
                        Some(profile)
                    }
                })
            }
            other => {
                let path = self.profile_dir.join(format!("{other}.ini"));
                Self::read_section(&path, name)
            }
        }
    }

    fn env_hints(&self, backend: Backend) -> Vec<(String, String)> {
        match backend {
            Backend::Aws => vec![
                (
                    "AWS_SHARED_CREDENTIALS_FILE".to_string(),
                    self.aws_credentials.display().to_string(),
                ),
                (
                    "AWS_CONFIG_FILE".to_string(),
                    self.aws_config.display().to_string(),
                ),
            ],
            _ => Vec::new(),
        }
    }
}

/// In-memory profiles.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileSource {
    profiles: HashMap<(Backend, String), Profile>,
}

impl MemoryProfileSource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile.
    #[must_use]
    pub fn with_profile<'a>(
        mut self,
        backend: Backend,
        name: impl Into<String>,
        values: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let profile = values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.profiles.insert((backend, name.into()), profile);
        self
    }
}

impl ProfileSource for MemoryProfileSource {
    fn profile(&self, backend: Backend, name: &str) -> Result<Option<Profile>, CredentialError> {
        Ok(self.profiles.get(&(backend, name.to_string())).cloned())
    }
}

/// Parse INI text into sections. Keys are lowercased; `#` and `;` start
/// comments; keys before the first section are dropped.
pub(crate) fn parse_ini(text: &str) -> HashMap<String, Profile> {
    let mut sections: HashMap<String, Profile> = HashMap::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some(section) = &current else {
            continue;
        };
        if let Some((key, value)) = line.split_once('=') {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    sections
}
