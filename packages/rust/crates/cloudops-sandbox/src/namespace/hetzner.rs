use async_trait::async_trait;
use cloudops_types::Backend;
use tracing::info;

use super::{BuildOptions, ExecutionNamespace, NamespaceFactory, PyExpr, check_bundle_backend};
use crate::credentials::{CredentialBundle, CredentialSources, resolve_hetzner};
use crate::error::CredentialError;

/// `hcloud` client namespace: `Client` and a `client` bound to one token.
pub struct HetznerNamespaceFactory {
    sources: CredentialSources,
}

impl HetznerNamespaceFactory {
    /// Factory resolving through `sources`.
    pub fn new(sources: CredentialSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl NamespaceFactory for HetznerNamespaceFactory {
    fn backend(&self) -> Backend {
        Backend::Hetzner
    }

    async fn build(
        &self,
        credentials: Option<CredentialBundle>,
        _options: &BuildOptions,
    ) -> Result<ExecutionNamespace, CredentialError> {
        check_bundle_backend(Backend::Hetzner, credentials.as_ref())?;
        let creds = match credentials {
            Some(CredentialBundle::Hetzner(creds)) => creds,
            _ => Default::default(),
        };
        let resolved = resolve_hetzner(&self.sources, creds)?;
        info!(origin = ?resolved.origin, "building hetzner namespace");

        let mut ns = ExecutionNamespace::new(Backend::Hetzner);
        ns.bind_common_modules();
        ns.bind("Client", PyExpr::from_import("hcloud", "Client"));
        let token = ns.secret(resolved.api_token);
        ns.bind("client", PyExpr::binding("Client").kwarg("token", token));
        Ok(ns)
    }
}
