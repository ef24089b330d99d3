use async_trait::async_trait;
use cloudops_types::Backend;
use tracing::info;

use super::{BuildOptions, ExecutionNamespace, NamespaceFactory, PyExpr, check_bundle_backend};
use crate::credentials::{CredentialBundle, CredentialSources, resolve_aws};
use crate::error::CredentialError;

/// Module name of the helpers shipped with every program that uses them.
pub const BUILTIN_HELPER_MODULE: &str = "cloudops_aws_helpers";

const BUILTIN_HELPER_SOURCE: &str = include_str!("aws_helpers.py");

/// `boto3` session namespace.
///
/// Binds `json`, `datetime`, `timedelta`, `boto3` and an authenticated
/// `session`; with helpers enabled also `aws`, `cost` and `monitoring`.
/// [`BUILTIN_HELPER_MODULE`] is shipped with the program; any other helper
/// module is imported from the interpreter's path.
pub struct AwsNamespaceFactory {
    sources: CredentialSources,
    default_region: String,
    helper_module: Option<String>,
}

impl AwsNamespaceFactory {
    /// Factory resolving through `sources`.
    pub fn new(
        sources: CredentialSources,
        default_region: impl Into<String>,
        helper_module: Option<String>,
    ) -> Self {
        Self {
            sources,
            default_region: default_region.into(),
            helper_module,
        }
    }
}

#[async_trait]
impl NamespaceFactory for AwsNamespaceFactory {
    fn backend(&self) -> Backend {
        Backend::Aws
    }

    async fn build(
        &self,
        credentials: Option<CredentialBundle>,
        options: &BuildOptions,
    ) -> Result<ExecutionNamespace, CredentialError> {
        check_bundle_backend(Backend::Aws, credentials.as_ref())?;
        let creds = match credentials {
            Some(CredentialBundle::Aws(creds)) => creds,
            _ => Default::default(),
        };
        let resolved = resolve_aws(&self.sources, creds, &self.default_region).await?;
        info!(origin = ?resolved.origin, region = %resolved.region, "building aws namespace");

        let mut ns = ExecutionNamespace::new(Backend::Aws);
        ns.bind_common_modules();
        ns.bind("boto3", PyExpr::module("boto3"));

        let mut session = PyExpr::from_import("boto3", "Session").call();
        if let Some(keys) = resolved.keys {
            let access = ns.secret(keys.access_key_id);
            let secret = ns.secret(keys.secret_access_key);
            session = session
                .kwarg("aws_access_key_id", access)
                .kwarg("aws_secret_access_key", secret);
            if let Some(token) = keys.session_token {
                let token = ns.secret(token);
                session = session.kwarg("aws_session_token", token);
            }
        } else if let Some(profile) = resolved.profile {
            for (var, value) in profile.env {
                ns.set_env(var, value);
            }
            session = session.kwarg("profile_name", PyExpr::str(profile.name));
        }
        session = session.kwarg("region_name", PyExpr::str(resolved.region));
        ns.bind("session", session);

        if options.helpers
            && let Some(module) = &self.helper_module
        {
            if module == BUILTIN_HELPER_MODULE {
                ns.provide_module(BUILTIN_HELPER_MODULE, BUILTIN_HELPER_SOURCE);
            }
            ns.bind_optional(
                "aws",
                PyExpr::from_import(module.as_str(), "AWSHelpers").arg(PyExpr::binding("session")),
            );
            ns.bind_optional("cost", PyExpr::from_import(module.as_str(), "CostUtils").call());
            ns.bind_optional(
                "monitoring",
                PyExpr::from_import(module.as_str(), "MonitoringUtils").call(),
            );
        }
        Ok(ns)
    }
}
