//! Credential precedence and namespace shape per backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cloudops_sandbox::credentials::{
    AwsCredentials, AwsKeys, AzureCredentials, CredentialOrigin, HetznerCredentials, MapEnv,
    MemoryProfileSource, RoleAssumer, RoleBase, resolve_aws, resolve_azure, resolve_hetzner,
};
use cloudops_sandbox::namespace::{
    AwsNamespaceFactory, AzureNamespaceFactory, BUILTIN_HELPER_MODULE, HetznerNamespaceFactory,
};
use cloudops_sandbox::{
    BuildOptions, CredentialBundle, CredentialError, CredentialSources, NamespaceFactory, PyExpr,
};
use cloudops_types::{Backend, Secret};

/// Returns fixed role keys and records what it was given.
#[derive(Default)]
struct FakeAssumer {
    calls: Mutex<Vec<(Option<String>, String, String)>>,
}

#[async_trait]
impl RoleAssumer for FakeAssumer {
    async fn assume_role(
        &self,
        base: RoleBase<'_>,
        role_arn: &str,
        region: &str,
    ) -> Result<AwsKeys, CredentialError> {
        let base = match base {
            RoleBase::Keys(keys) => Some(keys.access_key_id.expose().to_string()),
            RoleBase::Profile(profile) => Some(format!("profile:{}", profile.name)),
            RoleBase::DefaultChain => None,
        };
        self.calls.lock().unwrap().push((
            base,
            role_arn.to_string(),
            region.to_string(),
        ));
        Ok(AwsKeys {
            access_key_id: Secret::new("ASIAROLE"),
            secret_access_key: Secret::new("role-secret"),
            session_token: Some(Secret::new("role-token")),
        })
    }
}

fn profiles() -> MemoryProfileSource {
    MemoryProfileSource::new()
        .with_profile(
            Backend::Aws,
            "prod",
            [
                ("aws_access_key_id", "AKIAPROFILE"),
                ("aws_secret_access_key", "profile-secret"),
                ("region", "eu-central-1"),
            ],
        )
        .with_profile(
            Backend::Aws,
            "sso-dev",
            [
                ("sso_session", "corp"),
                ("sso_account_id", "123456789012"),
                ("region", "us-west-2"),
            ],
        )
        .with_profile(Backend::Hetzner, "lab", [("api_token", "profile-token")])
        .with_profile(
            Backend::Azure,
            "corp",
            [
                ("client_id", "profile-client"),
                ("client_secret", "profile-azure-secret"),
                ("tenant_id", "profile-tenant"),
                ("subscription_id", "profile-sub"),
            ],
        )
}

fn sources_with(env: MapEnv, assumer: Arc<FakeAssumer>) -> CredentialSources {
    CredentialSources::new(Arc::new(env), Arc::new(profiles()), assumer)
}

fn sources(env: MapEnv) -> CredentialSources {
    sources_with(env, Arc::new(FakeAssumer::default()))
}

fn ambient_aws() -> MapEnv {
    MapEnv::new()
        .with("AWS_ACCESS_KEY_ID", "AKIAENV")
        .with("AWS_SECRET_ACCESS_KEY", "env-secret")
        .with("AWS_DEFAULT_REGION", "ap-south-1")
}

#[tokio::test]
async fn test_aws_explicit_beats_profile_and_env() {
    let creds = AwsCredentials {
        access_key_id: Some(Secret::new("AKIAEXPLICIT")),
        secret_access_key: Some(Secret::new("explicit-secret")),
        profile: Some("prod".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(&sources(ambient_aws()), creds, "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Explicit);
    assert_eq!(resolved.keys.unwrap().access_key_id.expose(), "AKIAEXPLICIT");
    // explicit keys skip the profile, so its region is not consulted
    assert_eq!(resolved.region, "ap-south-1");
}

#[tokio::test]
async fn test_aws_profile_beats_env() {
    let creds = AwsCredentials {
        profile: Some("prod".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(&sources(ambient_aws()), creds, "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Profile("prod".to_string()));
    assert_eq!(resolved.keys.unwrap().access_key_id.expose(), "AKIAPROFILE");
    assert_eq!(resolved.region, "eu-central-1");
}

#[tokio::test]
async fn test_aws_env_then_default_chain() {
    let resolved = resolve_aws(&sources(ambient_aws()), AwsCredentials::default(), "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Ambient);
    assert_eq!(resolved.region, "ap-south-1");

    let resolved = resolve_aws(&sources(MapEnv::new()), AwsCredentials::default(), "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::DefaultChain);
    assert!(resolved.keys.is_none());
    assert_eq!(resolved.region, "us-east-1");
}

#[tokio::test]
async fn test_aws_ambient_profile_beats_ambient_keys() {
    let env = ambient_aws().with("AWS_PROFILE", "prod");
    let resolved = resolve_aws(&sources(env), AwsCredentials::default(), "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Profile("prod".to_string()));
    assert_eq!(resolved.keys.unwrap().access_key_id.expose(), "AKIAPROFILE");
    assert_eq!(resolved.region, "eu-central-1");
}

#[tokio::test]
async fn test_aws_request_profile_beats_ambient_profile() {
    let env = MapEnv::new().with("AWS_PROFILE", "sso-dev");
    let creds = AwsCredentials {
        profile: Some("prod".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(&sources(env), creds, "us-east-1").await.unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Profile("prod".to_string()));
}

#[tokio::test]
async fn test_aws_profile_without_keys_is_left_to_the_sdk() {
    let creds = AwsCredentials {
        profile: Some("sso-dev".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(&sources(ambient_aws()), creds, "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.origin, CredentialOrigin::Profile("sso-dev".to_string()));
    assert!(resolved.keys.is_none());
    assert_eq!(resolved.profile.unwrap().name, "sso-dev");
    assert_eq!(resolved.region, "us-west-2");
}

#[tokio::test]
async fn test_aws_half_pair_in_profile_is_incomplete() {
    let profiles = MemoryProfileSource::new().with_profile(
        Backend::Aws,
        "broken",
        [("aws_access_key_id", "AKIAHALF")],
    );
    let sources = CredentialSources::new(
        Arc::new(MapEnv::new()),
        Arc::new(profiles),
        Arc::new(FakeAssumer::default()),
    );
    let creds = AwsCredentials {
        profile: Some("broken".to_string()),
        ..AwsCredentials::default()
    };
    let err = resolve_aws(&sources, creds, "us-east-1").await.unwrap_err();
    assert!(matches!(err, CredentialError::Incomplete(_)));
}

#[tokio::test]
async fn test_aws_role_from_profile_without_keys() {
    let assumer = Arc::new(FakeAssumer::default());
    let creds = AwsCredentials {
        profile: Some("sso-dev".to_string()),
        role_arn: Some("arn:aws:iam::123456789012:role/ops".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(
        &sources_with(MapEnv::new(), Arc::clone(&assumer)),
        creds,
        "us-east-1",
    )
    .await
    .unwrap();
    assert!(resolved.profile.is_none());
    assert_eq!(resolved.keys.unwrap().access_key_id.expose(), "ASIAROLE");
    assert_eq!(
        assumer.calls.lock().unwrap()[0].0.as_deref(),
        Some("profile:sso-dev")
    );
}

#[tokio::test]
async fn test_aws_request_region_wins() {
    let creds = AwsCredentials {
        profile: Some("prod".to_string()),
        region: Some("sa-east-1".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(&sources(MapEnv::new()), creds, "us-east-1")
        .await
        .unwrap();
    assert_eq!(resolved.region, "sa-east-1");
}

#[tokio::test]
async fn test_aws_half_pair_is_incomplete() {
    let creds = AwsCredentials {
        access_key_id: Some(Secret::new("AKIAONLY")),
        ..AwsCredentials::default()
    };
    let err = resolve_aws(&sources(MapEnv::new()), creds, "us-east-1")
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::Incomplete(_)));
}

#[tokio::test]
async fn test_aws_unknown_profile() {
    let creds = AwsCredentials {
        profile: Some("nope".to_string()),
        ..AwsCredentials::default()
    };
    let err = resolve_aws(&sources(MapEnv::new()), creds, "us-east-1")
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::ProfileNotFound { .. }));
}

#[tokio::test]
async fn test_aws_role_is_assumed_with_base_keys() {
    let assumer = Arc::new(FakeAssumer::default());
    let creds = AwsCredentials {
        profile: Some("prod".to_string()),
        role_arn: Some("arn:aws:iam::123456789012:role/ops".to_string()),
        ..AwsCredentials::default()
    };
    let resolved = resolve_aws(
        &sources_with(MapEnv::new(), Arc::clone(&assumer)),
        creds,
        "us-east-1",
    )
    .await
    .unwrap();

    let keys = resolved.keys.unwrap();
    assert_eq!(keys.access_key_id.expose(), "ASIAROLE");
    assert_eq!(keys.session_token.unwrap().expose(), "role-token");
    assert!(matches!(resolved.origin, CredentialOrigin::AssumedRole(_)));
    assert_eq!(
        assumer.calls.lock().unwrap().as_slice(),
        &[(
            Some("AKIAPROFILE".to_string()),
            "arn:aws:iam::123456789012:role/ops".to_string(),
            "eu-central-1".to_string()
        )]
    );
}

#[tokio::test]
async fn test_aws_role_from_environment() {
    let assumer = Arc::new(FakeAssumer::default());
    let env = MapEnv::new().with("AWS_ROLE", "arn:aws:iam::1:role/env");
    resolve_aws(
        &sources_with(env, Arc::clone(&assumer)),
        AwsCredentials::default(),
        "us-east-1",
    )
    .await
    .unwrap();
    let calls = assumer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, None);
}

#[test]
fn test_hetzner_precedence() {
    let env = MapEnv::new().with("HCLOUD_API_TOKEN", "env-token");

    let explicit = HetznerCredentials {
        api_token: Some(Secret::new("explicit-token")),
        profile: Some("lab".to_string()),
    };
    let resolved = resolve_hetzner(&sources(env.clone()), explicit).unwrap();
    assert_eq!(resolved.api_token.expose(), "explicit-token");

    let profile = HetznerCredentials {
        api_token: None,
        profile: Some("lab".to_string()),
    };
    let resolved = resolve_hetzner(&sources(env.clone()), profile).unwrap();
    assert_eq!(resolved.api_token.expose(), "profile-token");

    let resolved = resolve_hetzner(&sources(env), HetznerCredentials::default()).unwrap();
    assert_eq!(resolved.api_token.expose(), "env-token");
    assert_eq!(resolved.origin, CredentialOrigin::Ambient);

    let err = resolve_hetzner(&sources(MapEnv::new()), HetznerCredentials::default()).unwrap_err();
    assert!(matches!(err, CredentialError::Missing(_)));
}

#[test]
fn test_azure_field_by_field() {
    let env = MapEnv::new()
        .with("AZURE_SUBSCRIPTION_ID", "env-sub")
        .with("AZURE_TENANT_ID", "env-tenant");
    let creds = AzureCredentials {
        client_id: Some("req-client".to_string()),
        client_secret: Some(Secret::new("req-secret")),
        ..AzureCredentials::default()
    };
    let resolved = resolve_azure(&sources(env), creds).unwrap();
    assert_eq!(resolved.subscription_id, "env-sub");
    let sp = resolved.service_principal.unwrap();
    assert_eq!(sp.client_id, "req-client");
    assert_eq!(sp.tenant_id, "env-tenant");

    let creds = AzureCredentials {
        profile: Some("corp".to_string()),
        subscription_id: Some("req-sub".to_string()),
        ..AzureCredentials::default()
    };
    let resolved = resolve_azure(&sources(MapEnv::new()), creds).unwrap();
    assert_eq!(resolved.subscription_id, "req-sub");
    assert_eq!(
        resolved.service_principal.unwrap().client_secret.expose(),
        "profile-azure-secret"
    );
}

#[test]
fn test_azure_requires_subscription() {
    let err = resolve_azure(&sources(MapEnv::new()), AzureCredentials::default()).unwrap_err();
    assert!(err.to_string().contains("subscription"));
}

#[tokio::test]
async fn test_aws_namespace_with_helpers() {
    let factory = AwsNamespaceFactory::new(
        sources(ambient_aws()),
        "us-east-1",
        Some(BUILTIN_HELPER_MODULE.to_string()),
    );
    let ns = factory.build(None, &BuildOptions::default()).await.unwrap();

    assert_eq!(ns.modules().len(), 1);
    assert_eq!(ns.modules()[0].0, BUILTIN_HELPER_MODULE);
    assert!(ns.modules()[0].1.contains("class CostUtils"));
    assert_eq!(
        ns.binding("cost"),
        Some(&PyExpr::from_import(BUILTIN_HELPER_MODULE, "CostUtils").call())
    );

    assert_eq!(
        ns.names().collect::<Vec<_>>(),
        vec![
            "json",
            "datetime",
            "timedelta",
            "boto3",
            "session",
            "aws",
            "cost",
            "monitoring"
        ]
    );
    assert_eq!(ns.bindings().iter().filter(|b| b.optional).count(), 3);
    assert_eq!(ns.secret_env().len(), 2);
    match ns.binding("session").unwrap() {
        PyExpr::Call { kwargs, .. } => {
            let names: Vec<_> = kwargs.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(
                names,
                vec!["aws_access_key_id", "aws_secret_access_key", "region_name"]
            );
            assert_eq!(kwargs[2].1, PyExpr::str("ap-south-1"));
        }
        other => panic!("unexpected session expression: {other:?}"),
    }
}

#[tokio::test]
async fn test_aws_namespace_without_helpers() {
    let factory = AwsNamespaceFactory::new(
        sources(MapEnv::new()),
        "us-east-1",
        Some(BUILTIN_HELPER_MODULE.to_string()),
    );
    let options = BuildOptions {
        helpers: false,
        preload_stored: false,
    };
    let ns = factory.build(None, &options).await.unwrap();
    assert!(ns.contains("session"));
    assert!(!ns.contains("aws"));
    assert!(ns.secret_env().is_empty());
    assert!(ns.modules().is_empty());
}

#[tokio::test]
async fn test_aws_namespace_with_external_helper_module() {
    let factory = AwsNamespaceFactory::new(
        sources(MapEnv::new()),
        "us-east-1",
        Some("site_helpers".to_string()),
    );
    let ns = factory.build(None, &BuildOptions::default()).await.unwrap();
    assert!(ns.modules().is_empty());
    assert_eq!(
        ns.binding("monitoring"),
        Some(&PyExpr::from_import("site_helpers", "MonitoringUtils").call())
    );
}

#[tokio::test]
async fn test_aws_namespace_passes_keyless_profile_by_name() {
    let factory = AwsNamespaceFactory::new(sources(ambient_aws()), "us-east-1", None);
    let bundle = CredentialBundle::Aws(AwsCredentials {
        profile: Some("sso-dev".to_string()),
        ..AwsCredentials::default()
    });
    let ns = factory
        .build(Some(bundle), &BuildOptions::default())
        .await
        .unwrap();

    assert!(ns.secret_env().is_empty());
    match ns.binding("session").unwrap() {
        PyExpr::Call { kwargs, .. } => {
            assert_eq!(
                kwargs,
                &vec![
                    ("profile_name".to_string(), PyExpr::str("sso-dev")),
                    ("region_name".to_string(), PyExpr::str("us-west-2")),
                ]
            );
        }
        other => panic!("unexpected session expression: {other:?}"),
    }
}

#[tokio::test]
async fn test_azure_namespace_clients() {
    let factory = AzureNamespaceFactory::new(sources(MapEnv::new()));
    let bundle = CredentialBundle::Azure(AzureCredentials {
        profile: Some("corp".to_string()),
        ..AzureCredentials::default()
    });
    let ns = factory
        .build(Some(bundle), &BuildOptions::default())
        .await
        .unwrap();

    for name in [
        "credential",
        "subscription_id",
        "compute_client",
        "storage_client",
        "resource_client",
        "network_client",
        "monitor_client",
        "ComputeManagementClient",
    ] {
        assert!(ns.contains(name), "missing {name}");
    }
    assert_eq!(ns.binding("subscription_id"), Some(&PyExpr::str("profile-sub")));
    assert_eq!(ns.secret_env().len(), 1);
    assert_eq!(ns.secret_env()[0].1.expose(), "profile-azure-secret");
}

#[tokio::test]
async fn test_azure_default_credential_without_principal() {
    let factory = AzureNamespaceFactory::new(sources(
        MapEnv::new().with("AZURE_SUBSCRIPTION_ID", "sub"),
    ));
    let ns = factory.build(None, &BuildOptions::default()).await.unwrap();
    assert_eq!(
        ns.binding("credential"),
        Some(&PyExpr::from_import("azure.identity", "DefaultAzureCredential").call())
    );
    assert!(ns.secret_env().is_empty());
}

#[tokio::test]
async fn test_hetzner_namespace_rejects_foreign_bundle() {
    let factory = HetznerNamespaceFactory::new(sources(MapEnv::new()));
    let bundle = CredentialBundle::Aws(AwsCredentials::default());
    let err = factory
        .build(Some(bundle), &BuildOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::BackendMismatch { .. }));
}
