use cloudops_types::{Backend, Secret};
use tracing::debug;

use super::profile::Profile;
use super::role::{AwsKeys, NamedProfile, RoleBase};
use super::{AwsCredentials, AzureCredentials, CredentialSources, HetznerCredentials};
use crate::error::CredentialError;

/// Where the effective credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Request fields.
    Explicit,
    /// Named profile.
    Profile(String),
    /// Environment variables.
    Ambient,
    /// Nothing supplied; the SDK's own provider chain decides.
    DefaultChain,
    /// Exchanged through role assumption.
    AssumedRole(String),
}

/// Resolved AWS session parameters.
#[derive(Debug, Clone)]
pub struct ResolvedAws {
    /// Static keys. `None` with no `profile` means the SDK default chain.
    pub keys: Option<AwsKeys>,
    /// Profile handed to the SDK when it carries no static keys.
    pub profile: Option<NamedProfile>,
    /// Effective region.
    pub region: String,
    /// Key origin.
    pub origin: CredentialOrigin,
}

/// Azure service principal.
#[derive(Debug, Clone)]
pub struct ServicePrincipal {
    /// Client id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: Secret,
    /// Tenant id.
    pub tenant_id: String,
}

/// Resolved Azure parameters.
#[derive(Debug, Clone)]
pub struct ResolvedAzure {
    /// Service principal when id, secret and tenant are all known.
    pub service_principal: Option<ServicePrincipal>,
    /// Subscription id.
    pub subscription_id: String,
}

/// Resolved Hetzner Cloud parameters.
#[derive(Debug, Clone)]
pub struct ResolvedHetzner {
    /// API token.
    pub api_token: Secret,
    /// Token origin.
    pub origin: CredentialOrigin,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn present(value: Option<Secret>) -> Option<Secret> {
    value.filter(|s| !s.expose().trim().is_empty())
}

fn lookup_profile(
    sources: &CredentialSources,
    backend: Backend,
    name: &str,
) -> Result<Profile, CredentialError> {
    sources
        .profiles
        .profile(backend, name)?
        .ok_or_else(|| CredentialError::ProfileNotFound {
            backend,
            profile: name.to_string(),
        })
}

/// Both halves or neither.
fn key_pair(
    access_key_id: Option<Secret>,
    secret_access_key: Option<Secret>,
    session_token: Option<Secret>,
    what: &str,
) -> Result<Option<AwsKeys>, CredentialError> {
    match (present(access_key_id), present(secret_access_key)) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Some(AwsKeys {
            access_key_id,
            secret_access_key,
            session_token: present(session_token),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(CredentialError::Incomplete(format!(
            "{what}: access key id given without secret access key"
        ))),
        (None, Some(_)) => Err(CredentialError::Incomplete(format!(
            "{what}: secret access key given without access key id"
        ))),
    }
}

/// Static keys of a profile. `Ok(None)` when it has none and the SDK must
/// resolve it (SSO, `role_arn`/`source_profile`, `credential_process`).
fn profile_keys(name: &str, profile: &Profile) -> Result<Option<AwsKeys>, CredentialError> {
    let field = |key: &str| profile.get(key).map(|v| Secret::new(v.as_str()));
    key_pair(
        field("aws_access_key_id"),
        field("aws_secret_access_key"),
        field("aws_session_token"),
        &format!("profile '{name}'"),
    )
}

/// Base identity before any role exchange.
enum AwsBase {
    Keys(AwsKeys),
    Profile(NamedProfile),
    DefaultChain,
}

/// Resolve AWS session parameters.
///
/// Base identity: explicit pair > request profile > ambient `AWS_PROFILE` >
/// ambient key pair > SDK default chain. A profile without static keys is
/// passed to the SDK by name. Region: request > profile >
/// `AWS_DEFAULT_REGION`/`AWS_REGION` > `default_region`. A role from the
/// request or `AWS_ROLE` is assumed last and replaces the base identity.
///
/// # Errors
///
/// Half a key pair, an unknown profile, or a failed role exchange.
pub async fn resolve_aws(
    sources: &CredentialSources,
    creds: AwsCredentials,
    default_region: &str,
) -> Result<ResolvedAws, CredentialError> {
    let env = &sources.env;
    let mut profile_region = None;

    let explicit = key_pair(
        creds.access_key_id,
        creds.secret_access_key,
        creds.session_token,
        "request credentials",
    )?;
    let profile_name = non_blank(creds.profile).or_else(|| env.var("AWS_PROFILE"));

    let (base, mut origin) = if let Some(keys) = explicit {
        (AwsBase::Keys(keys), CredentialOrigin::Explicit)
    } else if let Some(name) = profile_name {
        let profile = lookup_profile(sources, Backend::Aws, &name)?;
        profile_region = profile.get("region").cloned();
        let base = match profile_keys(&name, &profile)? {
            Some(keys) => AwsBase::Keys(keys),
            None => AwsBase::Profile(NamedProfile {
                name: name.clone(),
                env: sources.profiles.env_hints(Backend::Aws),
            }),
        };
        (base, CredentialOrigin::Profile(name))
    } else if let Some(keys) = key_pair(
        env.var("AWS_ACCESS_KEY_ID").map(Secret::new),
        env.var("AWS_SECRET_ACCESS_KEY").map(Secret::new),
        env.var("AWS_SESSION_TOKEN").map(Secret::new),
        "environment",
    )? {
        (AwsBase::Keys(keys), CredentialOrigin::Ambient)
    } else {
        (AwsBase::DefaultChain, CredentialOrigin::DefaultChain)
    };

    let region = non_blank(creds.region)
        .or(profile_region)
        .or_else(|| env.first_of(&["AWS_DEFAULT_REGION", "AWS_REGION"]))
        .unwrap_or_else(|| default_region.to_string());

    let (keys, profile) = if let Some(role_arn) =
        non_blank(creds.role_arn).or_else(|| env.var("AWS_ROLE"))
    {
        let role_base = match &base {
            AwsBase::Keys(keys) => RoleBase::Keys(keys),
            AwsBase::Profile(profile) => RoleBase::Profile(profile),
            AwsBase::DefaultChain => RoleBase::DefaultChain,
        };
        let assumed = sources
            .assumer
            .assume_role(role_base, &role_arn, &region)
            .await?;
        origin = CredentialOrigin::AssumedRole(role_arn);
        (Some(assumed), None)
    } else {
        match base {
            AwsBase::Keys(keys) => (Some(keys), None),
            AwsBase::Profile(profile) => (None, Some(profile)),
            AwsBase::DefaultChain => (None, None),
        }
    };

    debug!(?origin, %region, "aws credentials resolved");
    Ok(ResolvedAws {
        keys,
        profile,
        region,
        origin,
    })
}

/// Resolve Azure parameters field by field: request > profile > environment.
///
/// # Errors
///
/// Unknown profile, or no subscription id anywhere.
pub fn resolve_azure(
    sources: &CredentialSources,
    creds: AzureCredentials,
) -> Result<ResolvedAzure, CredentialError> {
    let profile = match non_blank(creds.profile) {
        Some(name) => Some(lookup_profile(sources, Backend::Azure, &name)?),
        None => None,
    };
    let from_profile = |key: &str| profile.as_ref().and_then(|p| p.get(key).cloned());
    let env = &sources.env;

    let pick = |explicit: Option<String>, key: &str, env_key: &str| {
        non_blank(explicit)
            .or_else(|| non_blank(from_profile(key)))
            .or_else(|| env.var(env_key))
    };

    let client_id = pick(creds.client_id, "client_id", "AZURE_CLIENT_ID");
    let tenant_id = pick(creds.tenant_id, "tenant_id", "AZURE_TENANT_ID");
    let subscription_id = pick(creds.subscription_id, "subscription_id", "AZURE_SUBSCRIPTION_ID")
        .ok_or_else(|| CredentialError::Missing("Azure subscription id".to_string()))?;
    let client_secret = present(creds.client_secret)
        .or_else(|| present(from_profile("client_secret").map(Secret::new)))
        .or_else(|| env.var("AZURE_CLIENT_SECRET").map(Secret::new));

    let service_principal = match (client_id, client_secret, tenant_id) {
        (Some(client_id), Some(client_secret), Some(tenant_id)) => Some(ServicePrincipal {
            client_id,
            client_secret,
            tenant_id,
        }),
        _ => None,
    };

    debug!(
        service_principal = service_principal.is_some(),
        "azure credentials resolved"
    );
    Ok(ResolvedAzure {
        service_principal,
        subscription_id,
    })
}

/// Resolve the Hetzner Cloud token: request > profile `api_token` >
/// `HCLOUD_API_TOKEN`/`HCLOUD_TOKEN`.
///
/// # Errors
///
/// Unknown profile, or no token anywhere.
pub fn resolve_hetzner(
    sources: &CredentialSources,
    creds: HetznerCredentials,
) -> Result<ResolvedHetzner, CredentialError> {
    if let Some(token) = present(creds.api_token) {
        return Ok(ResolvedHetzner {
            api_token: token,
            origin: CredentialOrigin::Explicit,
        });
    }
    if let Some(name) = non_blank(creds.profile) {
        let profile = lookup_profile(sources, Backend::Hetzner, &name)?;
        let token = present(profile.get("api_token").map(|v| Secret::new(v.as_str())))
            .ok_or_else(|| {
                CredentialError::Incomplete(format!("profile '{name}' has no api_token"))
            })?;
        return Ok(ResolvedHetzner {
            api_token: token,
            origin: CredentialOrigin::Profile(name),
        });
    }
    sources
        .env
        .first_of(&["HCLOUD_API_TOKEN", "HCLOUD_TOKEN"])
        .map(|token| ResolvedHetzner {
            api_token: Secret::new(token),
            origin: CredentialOrigin::Ambient,
        })
        .ok_or_else(|| CredentialError::Missing("Hetzner Cloud API token".to_string()))
}
