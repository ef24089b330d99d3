//! Tool dispatch through `CloudOpsService::call`.

mod support;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Notify;

use support::{RecordingRunner, builder, call, service_with_store};

#[tokio::test]
async fn test_snippet_lifecycle() {
    let runner = Arc::new(RecordingRunner::default());
    let service = service_with_store(Arc::clone(&runner), 5);

    let saved = call(
        &service,
        "save_snippet",
        json!({"name": "greet", "code": "def greet():\n    return 'hi'", "tags": ["demo"]}),
    )
    .await;
    assert_eq!(saved["success"], true);
    assert_eq!(saved["output"], "Snippet 'greet' saved successfully (version 1)");

    let resaved = call(
        &service,
        "save_snippet",
        json!({"name": "greet", "code": "def greet():\n    return 'hello'"}),
    )
    .await;
    assert_eq!(resaved["output"], "Snippet 'greet' saved successfully (version 2)");

    let run = call(
        &service,
        "execute_with_snippets",
        json!({"code": "print(greet())", "backend": "hetzner"}),
    )
    .await;
    assert_eq!(run["success"], true, "{run}");
    assert_eq!(run["output"], "done");
    assert_eq!(run["functions_available"], json!(["greet"]));
    let seen = runner.last();
    assert_eq!(seen.preloads, vec!["greet".to_string()]);
    assert_eq!(seen.secrets, vec!["env-token".to_string()]);

    let listing = call(&service, "list_snippets", json!({})).await;
    assert_eq!(listing["success"], true);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["limit"], 5);
    let entry = &listing["snippets"][0];
    assert_eq!(entry["name"], "greet");
    assert_eq!(entry["version"], 2);
    assert_eq!(entry["usage_count"], 1);
    assert!(entry.get("code").is_none());

    let filtered = call(&service, "list_snippets", json!({"category": "networking"})).await;
    assert_eq!(filtered["total"], 0);

    let deleted = call(&service, "delete_snippet", json!({"name": "greet"})).await;
    assert_eq!(deleted["success"], true);
    assert_eq!(deleted["output"], "Snippet 'greet' deleted successfully");

    let missing = call(&service, "delete_snippet", json!({"name": "greet"})).await;
    assert_eq!(missing["success"], false);
    assert_eq!(missing["error_type"], "ParameterError");
    assert_eq!(missing["error"], "Snippet 'greet' not found");
}

#[tokio::test]
async fn test_store_rejections_are_parameter_errors() {
    let service = service_with_store(Arc::new(RecordingRunner::default()), 1);

    let first = call(&service, "save_snippet", json!({"name": "a", "code": "x = 1"})).await;
    assert_eq!(first["success"], true);

    let full = call(&service, "save_snippet", json!({"name": "b", "code": "y = 2"})).await;
    assert_eq!(full["success"], false);
    assert_eq!(full["error_type"], "ParameterError");
    assert!(full["error"].as_str().unwrap().contains("(1)"), "{full}");

    let broken = call(
        &service,
        "save_snippet",
        json!({"name": "a", "code": "def broken(:\n    pass"}),
    )
    .await;
    assert_eq!(broken["success"], false);
    assert_eq!(broken["error_type"], "ParameterError");

    let unnamed = call(&service, "save_snippet", json!({"name": "  ", "code": "x = 1"})).await;
    assert_eq!(unnamed["error_type"], "ParameterError");
}

#[tokio::test]
async fn test_disabled_store() {
    let runner = Arc::new(RecordingRunner::default());
    let service = builder(Arc::clone(&runner)).build();
    assert!(!service.has_store());

    for (tool, args) in [
        ("save_snippet", json!({"name": "a", "code": "x = 1"})),
        ("list_snippets", json!({})),
        ("delete_snippet", json!({"name": "a"})),
        ("execute_with_snippets", json!({"code": "print(1)"})),
    ] {
        let response = call(&service, tool, args).await;
        assert_eq!(response["success"], false, "{tool}");
        assert_eq!(response["error_type"], "ParameterError", "{tool}");
        assert_eq!(response["error"], "Snippet storage is disabled", "{tool}");
    }
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_local_execution_tools() {
    let runner = Arc::new(RecordingRunner::default());
    let service = builder(Arc::clone(&runner)).build();

    let ok = call(
        &service,
        "hetzner_execute",
        json!({"code": "print(client.servers.get_all())", "hcloud_api_token": "arg-token"}),
    )
    .await;
    assert_eq!(ok["success"], true, "{ok}");
    assert!(ok.get("functions_available").is_none());
    assert_eq!(runner.last().secrets, vec!["arg-token".to_string()]);
    assert_eq!(runner.last().code, "print(client.servers.get_all())\n");

    let denied = call(&service, "aws_execute", json!({"code": "eval('1 + 1')"})).await;
    assert_eq!(denied["success"], false);
    assert_eq!(denied["error_type"], "VettingError");
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_ssh_requests_rejected_before_connecting() {
    let service = builder(Arc::new(RecordingRunner::default())).build();

    let no_auth = call(
        &service,
        "ssh_execute",
        json!({"hostname": "203.0.113.10", "command": "uptime", "use_ssh_agent": false}),
    )
    .await;
    assert_eq!(no_auth["success"], false);
    assert_eq!(no_auth["error_type"], "ParameterError");
    assert!(
        no_auth["error"]
            .as_str()
            .unwrap()
            .starts_with("At least one authentication method is required")
    );

    let dangerous = call(
        &service,
        "ssh_execute",
        json!({"hostname": "203.0.113.10", "command": "sudo rm -rf / --no-preserve-root", "password": "pw"}),
    )
    .await;
    assert_eq!(dangerous["error_type"], "ParameterError");
    assert!(dangerous["error"].as_str().unwrap().contains("rm -rf /"), "{dangerous}");

    let no_host = call(
        &service,
        "ssh_execute",
        json!({"hostname": "  ", "command": "uptime", "password": "pw"}),
    )
    .await;
    assert_eq!(no_host["error"], "Hostname is required for SSH connection");
}

#[tokio::test]
async fn test_unknown_tool_and_bad_arguments() {
    let service = builder(Arc::new(RecordingRunner::default())).build();

    let err = service.call("gcp_execute", None).await.unwrap_err();
    assert!(err.message.contains("unknown tool 'gcp_execute'"));

    let err = service.call("aws_execute", None).await.unwrap_err();
    assert!(err.message.contains("invalid arguments"), "{}", err.message);

    let Some(map) = json!({"code": "print(1)", "backend": "gcp"}).as_object().cloned() else {
        unreachable!()
    };
    assert!(service.call("execute_with_snippets", Some(map)).await.is_err());
}

#[tokio::test]
async fn test_concurrency_slots_are_reported() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let runner = Arc::new(RecordingRunner::gated(
        Arc::clone(&started),
        Arc::clone(&release),
    ));
    let service = builder(runner).max_concurrent(Some(2)).build();
    assert_eq!(service.max_concurrent(), Some(2));
    assert_eq!(service.in_flight(), Some(0));

    let worker = {
        let service = service.clone();
        tokio::spawn(async move {
            call(
                &service,
                "hetzner_execute",
                json!({"code": "print(1)", "hcloud_api_token": "t"}),
            )
            .await
        })
    };
    started.notified().await;
    assert_eq!(service.in_flight(), Some(1));
    release.notify_one();
    let response = worker.await.unwrap();
    assert_eq!(response["success"], true);
    assert_eq!(service.in_flight(), Some(0));

    let unlimited = builder(Arc::new(RecordingRunner::default()))
        .max_concurrent(Some(0))
        .build();
    assert_eq!(unlimited.max_concurrent(), None);
    assert_eq!(unlimited.in_flight(), None);
}
