//! Tool-handler tests against the in-memory rule client: idempotent add,
//! filter-based removal, alias and sentinel resolution, credential chain.

mod common;

use common::{TEST_PUBLIC_IP, context, credentials, engine, initialize, parse_response};
use serde_json::{Value, json};
use serial_test::serial;

use whitegate_cloud::InMemoryRuleClient;
use whitegate_core::{ExistingRule, PortRange, Protocol};
use whitegate_mcp::ToolError;
use whitegate_mcp::tools::call_tool;

const SG: &str = "sg-12345678";

fn existing(cidr: &str, port: u16, protocol: Protocol) -> ExistingRule {
    ExistingRule {
        cidr: cidr.to_string(),
        ports: Some(PortRange::single(port).unwrap()),
        protocol,
        description: None,
        rule_id: None,
    }
}

fn add_args(ip: &str, port: Value) -> Value {
    json!({
        "credentials": credentials(),
        "resource_id": SG,
        "ip_address": ip,
        "port": port,
    })
}

#[tokio::test]
async fn add_then_check_scenario() {
    let (ctx, _) = context();

    let added = call_tool(&ctx, "whitelist_add", &add_args("10.0.0.5", json!(443)))
        .await
        .unwrap();
    assert_eq!(added["success"], true);
    assert_eq!(added["rule"]["cidr"], "10.0.0.5/32");
    assert_eq!(added["rule"]["port"], 443);
    assert_eq!(added["rule"]["protocol"], "tcp");

    let checked = call_tool(
        &ctx,
        "whitelist_check",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "ip_address": "10.0.0.5",
            "port": 443,
            "protocol": "tcp",
        }),
    )
    .await
    .unwrap();
    assert_eq!(checked["success"], true);
    assert_eq!(checked["whitelisted"], true);
    assert_eq!(checked["rule"]["cidr"], "10.0.0.5/32");
}

#[tokio::test]
async fn add_twice_is_idempotent() {
    let (ctx, client) = context();
    let args = add_args("10.0.0.5", json!(443));

    let first = call_tool(&ctx, "whitelist_add", &args).await.unwrap();
    assert_eq!(first["success"], true);

    let second = call_tool(&ctx, "whitelist_add", &args).await.unwrap();
    assert_eq!(second["success"], true);
    assert!(second["message"].as_str().unwrap().contains("already present"));

    assert_eq!(client.rules_in(SG).len(), 1);
}

#[tokio::test]
async fn named_port_resolves_before_validation() {
    let (ctx, client) = context();

    let added = call_tool(&ctx, "whitelist_add", &add_args("10.0.0.5", json!("https")))
        .await
        .unwrap();
    assert_eq!(added["success"], true);
    assert_eq!(added["rule"]["port"], 443);
    assert_eq!(client.rules_in(SG)[0].ports, Some(PortRange::single(443).unwrap()));
}

#[tokio::test]
async fn bogus_port_name_fails_bounds_validation() {
    let (ctx, _) = context();

    let err = call_tool(&ctx, "whitelist_add", &add_args("10.0.0.5", json!("bogus")))
        .await
        .unwrap_err();
    match err {
        ToolError::InvalidParams { field, .. } => assert_eq!(field.as_deref(), Some("port")),
        other => panic!("expected invalid params, got {other:?}"),
    }
}

#[tokio::test]
async fn ephemeral_alias_adds_a_range() {
    let (ctx, client) = context();

    let added = call_tool(&ctx, "whitelist_add", &add_args("10.0.0.5", json!("ephemeral")))
        .await
        .unwrap();
    assert_eq!(added["success"], true);
    assert_eq!(added["rule"]["port"], "49152-65535");
    assert_eq!(client.rules_in(SG)[0].ports, Some(PortRange::new(49152, 65535).unwrap()));
}

#[tokio::test]
async fn current_sentinel_resolves_public_ip() {
    let (ctx, client) = context();

    let added = call_tool(&ctx, "whitelist_add", &add_args("current", json!(22)))
        .await
        .unwrap();
    assert_eq!(added["success"], true);
    assert_eq!(added["rule"]["cidr"], format!("{TEST_PUBLIC_IP}/32"));
    assert_eq!(client.rules_in(SG)[0].cidr, format!("{TEST_PUBLIC_IP}/32"));
}

#[tokio::test]
async fn invalid_ip_is_invalid_params() {
    let (ctx, _) = context();

    let err = call_tool(&ctx, "whitelist_add", &add_args("not-an-ip", json!(22)))
        .await
        .unwrap_err();
    match err {
        ToolError::InvalidParams { field, .. } => assert_eq!(field.as_deref(), Some("ip_address")),
        other => panic!("expected invalid params, got {other:?}"),
    }
}

#[tokio::test]
async fn remove_nonexistent_is_success_with_empty_report() {
    let (ctx, _) = context();

    let removed = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "ip_address": "9.9.9.9",
        }),
    )
    .await
    .unwrap();
    assert_eq!(removed["success"], true);
    assert_eq!(removed["removed"], json!([]));
    assert_eq!(removed["failed"], json!([]));
}

#[tokio::test]
async fn remove_by_ip_removes_every_port() {
    let (ctx, client) = context();
    client.seed(SG, vec![
        existing("1.2.3.4/32", 22, Protocol::Tcp),
        existing("1.2.3.4/32", 443, Protocol::Tcp),
        existing("5.6.7.8/32", 22, Protocol::Tcp),
    ]);

    let removed = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "ip_address": "1.2.3.4",
        }),
    )
    .await
    .unwrap();
    assert_eq!(removed["success"], true);
    assert_eq!(removed["removed"].as_array().unwrap().len(), 2);
    assert_eq!(client.rules_in(SG).len(), 1);
}

#[tokio::test]
async fn remove_by_service_name_matches_port() {
    let (ctx, client) = context();
    client.seed(SG, vec![
        existing("1.2.3.4/32", 22, Protocol::Tcp),
        existing("5.6.7.8/32", 443, Protocol::Tcp),
    ]);

    let removed = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "service_name": "ssh",
        }),
    )
    .await
    .unwrap();
    assert_eq!(removed["success"], true);
    assert_eq!(removed["removed"].as_array().unwrap().len(), 1);
    assert_eq!(client.rules_in(SG)[0].cidr, "5.6.7.8/32");
}

#[tokio::test]
async fn remove_without_any_filter_is_invalid_params() {
    let (ctx, _) = context();

    let err = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({"credentials": credentials(), "resource_id": SG}),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ToolError::InvalidParams { .. }));
}

#[tokio::test]
async fn remove_with_conflicting_port_and_service_is_rejected() {
    let (ctx, _) = context();

    let err = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "port": 80,
            "service_name": "ssh",
        }),
    )
    .await
    .unwrap_err();
    match err {
        ToolError::InvalidParams { field, .. } => assert_eq!(field.as_deref(), Some("service_name")),
        other => panic!("expected invalid params, got {other:?}"),
    }
}

#[tokio::test]
async fn partial_removal_failure_is_reported_per_rule() {
    let (ctx, client) = context();
    client.seed(SG, vec![
        existing("1.2.3.4/32", 22, Protocol::Tcp),
        existing("1.2.3.4/32", 443, Protocol::Tcp),
    ]);
    client.fail_revoke_for("1.2.3.4/32", 443);

    let removed = call_tool(
        &ctx,
        "whitelist_remove",
        &json!({
            "credentials": credentials(),
            "resource_id": SG,
            "ip_address": "1.2.3.4",
        }),
    )
    .await
    .unwrap();
    assert_eq!(removed["success"], false);
    assert_eq!(removed["removed"].as_array().unwrap().len(), 1);
    let failed = removed["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["error"].as_str().unwrap().contains("injected"));
}

#[tokio::test]
async fn list_returns_snapshot_with_count() {
    let (ctx, client) = context();
    client.seed(SG, vec![
        existing("1.2.3.4/32", 22, Protocol::Tcp),
        existing("5.6.7.8/32", 443, Protocol::Udp),
    ]);

    let listed = call_tool(
        &ctx,
        "whitelist_list",
        &json!({"credentials": credentials(), "resource_id": SG}),
    )
    .await
    .unwrap();
    assert_eq!(listed["success"], true);
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["rules"][1]["protocol"], "udp");
    assert_eq!(listed["rules"][0]["ports"]["from"], 22);
}

#[tokio::test]
async fn authorization_denial_is_reported_as_tool_failure() {
    let (ctx, client) = context();
    client.deny_authorization();

    let result = call_tool(&ctx, "whitelist_add", &add_args("10.0.0.5", json!(22)))
        .await
        .unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["error"]["code"], "authorization_error");
}

#[tokio::test]
#[serial]
async fn missing_credentials_everywhere_is_invalid_params() {
    let (ctx, _) = context();

    // No request credentials, no environment, no config profile.
    unsafe {
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        std::env::remove_var("AWS_SESSION_TOKEN");
    }

    let err = call_tool(
        &ctx,
        "whitelist_add",
        &json!({"resource_id": SG, "ip_address": "10.0.0.5", "port": 22}),
    )
    .await
    .unwrap_err();
    match err {
        ToolError::InvalidParams { field, .. } => {
            assert_eq!(field.as_deref(), Some("credentials"));
        }
        other => panic!("expected invalid params, got {other:?}"),
    }
}

#[tokio::test]
async fn direct_method_dispatch_matches_tools_call() {
    let (mut engine, client) = engine();
    initialize(&mut engine).await;

    let request = json!({
        "jsonrpc": "2.0",
        "id": 10,
        "method": "whitelist_add",
        "params": add_args("10.0.0.9", json!(8080)),
    });
    let response = engine.handle_line(&request.to_string()).await.unwrap();
    let value = parse_response(&response);
    assert_eq!(value["result"]["success"], true);
    assert_eq!(client.rules_in(SG).len(), 1);

    let call = json!({
        "jsonrpc": "2.0",
        "id": 11,
        "method": "tools/call",
        "params": {"name": "whitelist_check", "arguments": {
            "credentials": credentials(),
            "resource_id": SG,
            "ip_address": "10.0.0.9",
            "port": 8080,
        }},
    });
    let response = engine.handle_line(&call.to_string()).await.unwrap();
    let value = parse_response(&response);
    assert_eq!(value["result"]["whitelisted"], true);
}
