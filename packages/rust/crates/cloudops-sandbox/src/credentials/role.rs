//! Role assumption.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use cloudops_types::Secret;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CredentialError;

/// Session name presented to STS.
pub const ROLE_SESSION_NAME: &str = "CloudOpsSession";

/// Environment inherited by the CLI besides the base credentials.
const CLI_ENV_PASSTHROUGH: [&str; 6] = [
    "PATH",
    "HOME",
    "AWS_CONFIG_FILE",
    "AWS_SHARED_CREDENTIALS_FILE",
    "AWS_CA_BUNDLE",
    "SSL_CERT_FILE",
];

/// An AWS access key pair with optional session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsKeys {
    /// Access key id.
    pub access_key_id: Secret,
    /// Secret access key.
    pub secret_access_key: Secret,
    /// Session token for temporary credentials.
    pub session_token: Option<Secret>,
}

/// An AWS profile that the SDK resolves itself (SSO, `source_profile`,
/// `credential_process`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProfile {
    /// Profile name.
    pub name: String,
    /// Variables pointing the SDK at the profile files.
    pub env: Vec<(String, String)>,
}

/// Identity a role exchange starts from.
#[derive(Debug, Clone, Copy)]
pub enum RoleBase<'a> {
    /// Static keys.
    Keys(&'a AwsKeys),
    /// Named profile without static keys.
    Profile(&'a NamedProfile),
    /// Default provider chain.
    DefaultChain,
}

/// Exchanges base credentials for role credentials.
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    /// Assume `role_arn` starting from `base`.
    ///
    /// # Errors
    ///
    /// [`CredentialError::RoleAssumption`] when the exchange fails.
    async fn assume_role(
        &self,
        base: RoleBase<'_>,
        role_arn: &str,
        region: &str,
    ) -> Result<AwsKeys, CredentialError>;
}

/// Runs `aws sts assume-role` as a child process.
#[derive(Debug, Clone)]
pub struct AwsCliRoleAssumer {
    program: PathBuf,
    duration_secs: u64,
    timeout: Duration,
}

impl AwsCliRoleAssumer {
    /// CLI at `program`, requesting sessions of `duration_secs`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, duration_secs: u64) -> Self {
        Self {
            program: program.into(),
            duration_secs,
            timeout: Duration::from_secs(30),
        }
    }

    /// Bound on the CLI call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for AwsCliRoleAssumer {
    fn default() -> Self {
        Self::new("aws", 3600)
    }
}

#[async_trait]
impl RoleAssumer for AwsCliRoleAssumer {
    async fn assume_role(
        &self,
        base: RoleBase<'_>,
        role_arn: &str,
        region: &str,
    ) -> Result<AwsKeys, CredentialError> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "sts",
            "assume-role",
            "--role-arn",
            role_arn,
            "--role-session-name",
            ROLE_SESSION_NAME,
            "--duration-seconds",
            &self.duration_secs.to_string(),
            "--output",
            "json",
        ])
        .env_clear()
        .stdin(Stdio::null())
        .kill_on_drop(true);

        for key in CLI_ENV_PASSTHROUGH {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.env("AWS_DEFAULT_REGION", region);
        match base {
            RoleBase::Keys(keys) => {
                cmd.env("AWS_ACCESS_KEY_ID", keys.access_key_id.expose());
                cmd.env("AWS_SECRET_ACCESS_KEY", keys.secret_access_key.expose());
                if let Some(token) = &keys.session_token {
                    cmd.env("AWS_SESSION_TOKEN", token.expose());
                }
            }
            RoleBase::Profile(profile) => {
                cmd.args(["--profile", profile.name.as_str()]);
                cmd.envs(profile.env.iter().map(|(k, v)| (k, v)));
            }
            RoleBase::DefaultChain => {}
        }

        debug!(role_arn, "assuming role via aws cli");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CredentialError::RoleAssumption(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                )));
            }
            Err(_) => {
                return Err(CredentialError::RoleAssumption(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::RoleAssumption(stderr.trim().to_string()));
        }
        let keys = parse_assume_role_output(&output.stdout)?;
        info!(role_arn, "role assumed");
        Ok(keys)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleOutput {
    credentials: StsCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StsCredentials {
    access_key_id: Secret,
    secret_access_key: Secret,
    session_token: Secret,
}

/// Decode the JSON printed by `aws sts assume-role`.
pub(crate) fn parse_assume_role_output(stdout: &[u8]) -> Result<AwsKeys, CredentialError> {
    let parsed: AssumeRoleOutput = serde_json::from_slice(stdout).map_err(|e| {
        CredentialError::RoleAssumption(format!("unexpected assume-role output: {e}"))
    })?;
    let creds = parsed.credentials;
    Ok(AwsKeys {
        access_key_id: creds.access_key_id,
        secret_access_key: creds.secret_access_key,
        session_token: Some(creds.session_token),
    })
}
