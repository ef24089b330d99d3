//! Per-request credential bundles and their resolution.
//!
//! Precedence for every backend: explicit request fields, then the named
//! profile, then ambient environment defaults. Profile lookups and role
//! exchanges happen once per request and nothing is cached.

mod env;
mod profile;
mod resolve;
mod role;

use std::path::PathBuf;
use std::sync::Arc;

use cloudops_types::{Backend, Secret};
use serde::Deserialize;

pub use env::{AmbientEnv, MapEnv, ProcessEnv};
pub use profile::{IniProfileSource, MemoryProfileSource, Profile, ProfileSource};
pub use resolve::{
    CredentialOrigin, ResolvedAws, ResolvedAzure, ResolvedHetzner, ServicePrincipal, resolve_aws,
    resolve_azure, resolve_hetzner,
};
pub use role::{AwsCliRoleAssumer, AwsKeys, NamedProfile, ROLE_SESSION_NAME, RoleAssumer, RoleBase};

use crate::config::BackendsConfig;

/// AWS request fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: Option<Secret>,
    /// Secret access key.
    pub secret_access_key: Option<Secret>,
    /// Session token for temporary keys.
    pub session_token: Option<Secret>,
    /// Region name.
    pub region: Option<String>,
    /// Named profile.
    pub profile: Option<String>,
    /// Role to assume after resolving the base credentials.
    pub role_arn: Option<String>,
}

/// Azure request fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AzureCredentials {
    /// Service principal client id.
    pub client_id: Option<String>,
    /// Service principal secret.
    pub client_secret: Option<Secret>,
    /// Directory (tenant) id.
    pub tenant_id: Option<String>,
    /// Subscription the management clients are bound to.
    pub subscription_id: Option<String>,
    /// Named profile.
    pub profile: Option<String>,
}

/// Hetzner Cloud request fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HetznerCredentials {
    /// API token.
    pub api_token: Option<Secret>,
    /// Named profile.
    pub profile: Option<String>,
}

/// Backend-specific credential bundle. Lives for one request.
#[derive(Debug, Clone)]
pub enum CredentialBundle {
    /// AWS fields.
    Aws(AwsCredentials),
    /// Azure fields.
    Azure(AzureCredentials),
    /// Hetzner fields.
    Hetzner(HetznerCredentials),
}

impl CredentialBundle {
    /// Backend the bundle belongs to.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            CredentialBundle::Aws(_) => Backend::Aws,
            CredentialBundle::Azure(_) => Backend::Azure,
            CredentialBundle::Hetzner(_) => Backend::Hetzner,
        }
    }
}

/// Collaborators consulted during resolution.
#[derive(Clone)]
pub struct CredentialSources {
    /// Ambient values.
    pub env: Arc<dyn AmbientEnv>,
    /// Named profiles.
    pub profiles: Arc<dyn ProfileSource>,
    /// Role exchange.
    pub assumer: Arc<dyn RoleAssumer>,
}

impl CredentialSources {
    /// Explicit collaborators.
    pub fn new(
        env: Arc<dyn AmbientEnv>,
        profiles: Arc<dyn ProfileSource>,
        assumer: Arc<dyn RoleAssumer>,
    ) -> Self {
        Self {
            env,
            profiles,
            assumer,
        }
    }

    /// Process environment, INI profiles under the home directory and the
    /// AWS CLI.
    #[must_use]
    pub fn system(config: &BackendsConfig) -> Self {
        let env = ProcessEnv;
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let profiles = IniProfileSource::from_home(
            &home,
            config.aws_credentials_file.clone(),
            config.aws_config_file.clone(),
            config.profile_dir.clone(),
        );
        let assumer = AwsCliRoleAssumer::new(&config.aws_cli, config.role_session_duration_secs);
        Self::new(Arc::new(env), Arc::new(profiles), Arc::new(assumer))
    }
}

impl std::fmt::Debug for CredentialSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSources").finish_non_exhaustive()
    }
}
