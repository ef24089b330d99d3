use async_trait::async_trait;
use cloudops_types::Backend;
use tracing::info;

use super::{BuildOptions, ExecutionNamespace, NamespaceFactory, PyExpr, check_bundle_backend};
use crate::credentials::{CredentialBundle, CredentialSources, resolve_azure};
use crate::error::CredentialError;

/// `(binding name, module, class)` for every management client.
const MANAGEMENT_CLIENTS: [(&str, &str, &str); 5] = [
    ("compute_client", "azure.mgmt.compute", "ComputeManagementClient"),
    ("storage_client", "azure.mgmt.storage", "StorageManagementClient"),
    ("resource_client", "azure.mgmt.resource", "ResourceManagementClient"),
    ("network_client", "azure.mgmt.network", "NetworkManagementClient"),
    ("monitor_client", "azure.mgmt.monitor", "MonitorManagementClient"),
];

/// Azure management-client namespace.
pub struct AzureNamespaceFactory {
    sources: CredentialSources,
}

impl AzureNamespaceFactory {
    /// Factory resolving through `sources`.
    pub fn new(sources: CredentialSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl NamespaceFactory for AzureNamespaceFactory {
    fn backend(&self) -> Backend {
        Backend::Azure
    }

    async fn build(
        &self,
        credentials: Option<CredentialBundle>,
        _options: &BuildOptions,
    ) -> Result<ExecutionNamespace, CredentialError> {
        check_bundle_backend(Backend::Azure, credentials.as_ref())?;
        let creds = match credentials {
            Some(CredentialBundle::Azure(creds)) => creds,
            _ => Default::default(),
        };
        let resolved = resolve_azure(&self.sources, creds)?;

        let mut ns = ExecutionNamespace::new(Backend::Azure);
        ns.bind_common_modules();

        let credential = match resolved.service_principal {
            Some(sp) => {
                info!("using azure service principal");
                let secret = ns.secret(sp.client_secret);
                PyExpr::from_import("azure.identity", "ClientSecretCredential")
                    .kwarg("tenant_id", PyExpr::str(sp.tenant_id))
                    .kwarg("client_id", PyExpr::str(sp.client_id))
                    .kwarg("client_secret", secret)
            }
            None => {
                info!("using azure default credential chain");
                PyExpr::from_import("azure.identity", "DefaultAzureCredential").call()
            }
        };
        ns.bind("credential", credential);
        ns.bind("subscription_id", PyExpr::str(resolved.subscription_id));

        for (binding, module, class) in MANAGEMENT_CLIENTS {
            ns.bind(class, PyExpr::from_import(module, class));
            ns.bind(
                binding,
                PyExpr::binding(class)
                    .arg(PyExpr::binding("credential"))
                    .arg(PyExpr::binding("subscription_id")),
            );
        }
        Ok(ns)
    }
}
