//! Tool names, argument schemas and their conversion into requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cloudops_remote::{RemoteRequest, RemoteTarget, SshAuth};
use cloudops_sandbox::credentials::{AwsCredentials, AzureCredentials, HetznerCredentials};
use cloudops_sandbox::{BuildOptions, CredentialBundle, ExecutionRequest};
use cloudops_types::{Backend, Secret};
use rmcp::model::Tool;
use schemars::JsonSchema;
use serde::Deserialize;

/// `aws_execute`.
pub const AWS_EXECUTE: &str = "aws_execute";
/// `azure_execute`.
pub const AZURE_EXECUTE: &str = "azure_execute";
/// `hetzner_execute`.
pub const HETZNER_EXECUTE: &str = "hetzner_execute";
/// `ssh_execute`.
pub const SSH_EXECUTE: &str = "ssh_execute";
/// `save_snippet`.
pub const SAVE_SNIPPET: &str = "save_snippet";
/// `list_snippets`.
pub const LIST_SNIPPETS: &str = "list_snippets";
/// `delete_snippet`.
pub const DELETE_SNIPPET: &str = "delete_snippet";
/// `execute_with_snippets`.
pub const EXECUTE_WITH_SNIPPETS: &str = "execute_with_snippets";

/// Arguments of `aws_execute`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AwsExecuteArgs {
    /// Python code using the preconfigured boto3 `session`.
    pub code: String,
    /// Execution bound in seconds (default 30, max 300).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Access key id for this call only.
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    /// Secret access key for this call only.
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    /// Session token for temporary keys.
    #[serde(default)]
    pub aws_session_token: Option<String>,
    /// Region name.
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile from the AWS credentials file.
    #[serde(default)]
    pub profile: Option<String>,
    /// Role to assume for this call.
    #[serde(default)]
    pub role_arn: Option<String>,
}

/// Arguments of `azure_execute`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AzureExecuteArgs {
    /// Python code using the preconfigured management clients.
    pub code: String,
    /// Execution bound in seconds (default 30, max 300).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Service principal client id.
    #[serde(default)]
    pub azure_client_id: Option<String>,
    /// Service principal secret.
    #[serde(default)]
    pub azure_client_secret: Option<String>,
    /// Directory (tenant) id.
    #[serde(default)]
    pub azure_tenant_id: Option<String>,
    /// Subscription id.
    #[serde(default)]
    pub azure_subscription_id: Option<String>,
    /// Named profile from `azure.ini`.
    #[serde(default)]
    pub profile: Option<String>,
}

/// Arguments of `hetzner_execute`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HetznerExecuteArgs {
    /// Python code using the preconfigured hcloud `client`.
    pub code: String,
    /// Execution bound in seconds (default 30, max 300).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// API token for this call only.
    #[serde(default)]
    pub hcloud_api_token: Option<String>,
    /// Named profile from `hetzner.ini`.
    #[serde(default)]
    pub profile: Option<String>,
}

/// Arguments of `ssh_execute`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SshExecuteArgs {
    /// Host name or address.
    pub hostname: String,
    /// Shell command to run once.
    pub command: String,
    /// Login user.
    #[serde(default = "default_username")]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
    /// Private key text (RSA, Ed25519 or ECDSA).
    #[serde(default)]
    pub private_key: Option<String>,
    /// Private key file on the server host.
    #[serde(default)]
    pub private_key_path: Option<String>,
    /// Passphrase of an encrypted private key.
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Command bound in seconds (default 30, max 300).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Offer keys from the local SSH agent.
    #[serde(default = "default_true")]
    pub use_ssh_agent: bool,
    /// Reject commands containing destructive patterns.
    #[serde(default = "default_true")]
    pub sanitize: bool,
}

/// Arguments of `delete_snippet`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteSnippetArgs {
    /// Snippet name.
    pub name: String,
}

/// Arguments of `execute_with_snippets`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteWithSnippetsArgs {
    /// Python code; every stored snippet is loaded first.
    pub code: String,
    /// Namespace to build (default `aws`).
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Execution bound in seconds (default 30, max 300).
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_username() -> String {
    cloudops_remote::config::DEFAULT_USER.to_string()
}

fn default_port() -> u16 {
    cloudops_remote::config::DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_backend() -> Backend {
    Backend::Aws
}

fn secret(value: Option<String>) -> Option<Secret> {
    Secret::non_empty(value)
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn seconds(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_secs)
}

fn local_request(
    backend: Backend,
    code: String,
    credentials: CredentialBundle,
    timeout: Option<u64>,
) -> ExecutionRequest {
    let mut request = ExecutionRequest::new(backend, code).with_credentials(credentials);
    request.timeout = seconds(timeout);
    request
}

impl From<AwsExecuteArgs> for ExecutionRequest {
    fn from(args: AwsExecuteArgs) -> Self {
        let credentials = CredentialBundle::Aws(AwsCredentials {
            access_key_id: secret(args.aws_access_key_id),
            secret_access_key: secret(args.aws_secret_access_key),
            session_token: secret(args.aws_session_token),
            region: text(args.region),
            profile: text(args.profile),
            role_arn: text(args.role_arn),
        });
        local_request(Backend::Aws, args.code, credentials, args.timeout)
    }
}

impl From<AzureExecuteArgs> for ExecutionRequest {
    fn from(args: AzureExecuteArgs) -> Self {
        let credentials = CredentialBundle::Azure(AzureCredentials {
            client_id: text(args.azure_client_id),
            client_secret: secret(args.azure_client_secret),
            tenant_id: text(args.azure_tenant_id),
            subscription_id: text(args.azure_subscription_id),
            profile: text(args.profile),
        });
        local_request(Backend::Azure, args.code, credentials, args.timeout)
    }
}

impl From<HetznerExecuteArgs> for ExecutionRequest {
    fn from(args: HetznerExecuteArgs) -> Self {
        let credentials = CredentialBundle::Hetzner(HetznerCredentials {
            api_token: secret(args.hcloud_api_token),
            profile: text(args.profile),
        });
        local_request(Backend::Hetzner, args.code, credentials, args.timeout)
    }
}

impl From<ExecuteWithSnippetsArgs> for ExecutionRequest {
    fn from(args: ExecuteWithSnippetsArgs) -> Self {
        let mut request = ExecutionRequest::new(args.backend, args.code).with_options(BuildOptions {
            helpers: true,
            preload_stored: true,
        });
        request.timeout = seconds(args.timeout);
        request
    }
}

impl From<SshExecuteArgs> for RemoteRequest {
    fn from(args: SshExecuteArgs) -> Self {
        let target = RemoteTarget::new(args.hostname.trim())
            .with_port(args.port)
            .with_user(args.username);
        let auth = SshAuth {
            password: secret(args.password),
            private_key: secret(args.private_key),
            private_key_path: text(args.private_key_path).map(PathBuf::from),
            passphrase: secret(args.private_key_passphrase),
            use_agent: args.use_ssh_agent,
        };
        let mut request = RemoteRequest::new(target, args.command)
            .with_auth(auth)
            .with_sanitize(args.sanitize);
        request.timeout = seconds(args.timeout);
        request
    }
}

fn tool<T: JsonSchema>(name: &'static str, title: &'static str, description: &'static str) -> Tool {
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .ok()
        .and_then(|value| value.as_object().cloned())
        .unwrap_or_default();
    Tool {
        name: name.into(),
        title: Some(title.into()),
        description: Some(description.into()),
        input_schema: Arc::new(schema),
        output_schema: None,
        annotations: None,
        execution: None,
        icons: None,
        meta: None,
    }
}

/// Every tool, in listing order.
#[must_use]
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        tool::<AwsExecuteArgs>(
            AWS_EXECUTE,
            "Execute AWS boto3 code",
            "Run Python against a preconfigured boto3 `session` (plus boto3, json, datetime, \
             timedelta and the aws/cost/monitoring helpers). Calls to eval, exec, open and \
             subprocess functions are rejected. Default timeout 30 seconds.",
        ),
        tool::<AzureExecuteArgs>(
            AZURE_EXECUTE,
            "Execute Azure SDK code",
            "Run Python against preconfigured Azure management clients (compute_client, \
             storage_client, network_client, monitor_client, resource_client) and \
             `credential`. Default timeout 30 seconds.",
        ),
        tool::<HetznerExecuteArgs>(
            HETZNER_EXECUTE,
            "Execute Hetzner Cloud code",
            "Run Python against a preconfigured hcloud `client`. Default timeout 30 seconds.",
        ),
        tool::<SshExecuteArgs>(
            SSH_EXECUTE,
            "Execute a command over SSH",
            "Run one shell command on a remote host with credentials supplied per request. \
             Supports password, private key (RSA, Ed25519, ECDSA) and agent authentication. \
             Destructive commands are rejected unless sanitize is false.",
        ),
        tool::<cloudops_store::NewSnippet>(
            SAVE_SNIPPET,
            "Save a reusable snippet",
            "Store Python code under a name for later use by execute_with_snippets. \
             Re-saving a name bumps its version.",
        ),
        tool::<cloudops_store::SnippetFilter>(
            LIST_SNIPPETS,
            "List stored snippets",
            "List stored snippets, optionally filtered by category or tags.",
        ),
        tool::<DeleteSnippetArgs>(
            DELETE_SNIPPET,
            "Delete a stored snippet",
            "Remove a stored snippet by name.",
        ),
        tool::<ExecuteWithSnippetsArgs>(
            EXECUTE_WITH_SNIPPETS,
            "Execute code with stored snippets",
            "Load every stored snippet into the namespace, then run the code. The response \
             lists the snippets that loaded in functions_available.",
        ),
    ]
}
