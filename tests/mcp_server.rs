mod common;

use common::{quiet_logger, test_config, FakeResponse, FakeVanta, RecordingTransport};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use vanta_mcp::app::App;
use vanta_mcp::mcp::server::McpServer;

fn server_with(extra: &[(&str, &str)]) -> (McpServer, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let config = test_config("https://api.vanta.test/v1", extra);
    let app = App::with_transport(config, quiet_logger(), transport.clone()).expect("app");
    (McpServer::new(Arc::new(app)), transport)
}

async fn call(server: &McpServer, line: Value) -> Value {
    let response = server
        .handle_line(&line.to_string())
        .await
        .expect("response expected");
    serde_json::to_value(response).expect("serialize response")
}

fn output_lines(output: Vec<u8>) -> Vec<Value> {
    String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response json"))
        .collect()
}

fn envelope_of(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("envelope json")
}

#[tokio::test]
async fn initialize_reports_tools_capability() {
    let (server, _) = server_with(&[]);

    let response = call(
        &server,
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
    )
    .await;

    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["serverInfo"]["name"], "vanta-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert!(response["result"]["protocolVersion"].is_string());
}

#[tokio::test]
async fn tools_list_marks_mutations() {
    let (server, _) = server_with(&[]);

    let response = call(&server, json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" })).await;

    let tools = response["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), 19);
    let by_name = |name: &str| tools.iter().find(|t| t["name"] == name).cloned().unwrap();
    let create = by_name("create_custom_control");
    assert!(create["description"].as_str().unwrap().starts_with("[WRITE] "));
    assert_eq!(create["inputSchema"]["properties"]["confirm"]["type"], "boolean");
    let list = by_name("list_controls");
    assert!(!list["description"].as_str().unwrap().starts_with("[WRITE]"));
    assert!(list["inputSchema"]["properties"].get("confirm").is_none());
}

#[tokio::test]
async fn enabled_tools_filter_limits_listing_and_calls() {
    let (server, transport) = server_with(&[("VANTA_MCP_ENABLED_TOOLS", "list_controls,GET_CONTROL")]);

    let response = call(&server, json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" })).await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, vec!["list_controls", "get_control"]);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": { "name": "list_documents", "arguments": {} },
        }),
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
    let envelope = envelope_of(&response);
    assert_eq!(envelope["error"]["code"], "unknown_tool");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn tools_call_returns_success_envelope() {
    let (server, transport) = server_with(&[]);
    transport.respond_json(200, json!({ "results": { "data": [{ "id": "ctl-1" }] } }));

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": { "name": "list_controls", "arguments": { "pageSize": 5 } },
        }),
    )
    .await;

    assert_eq!(response["id"], "call-1");
    assert_eq!(response["result"]["isError"], false);
    let envelope = envelope_of(&response);
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["results"]["data"][0]["id"], "ctl-1");
    assert_eq!(transport.calls()[0].query.get("pageSize"), Some(&json!(5)));
}

#[tokio::test]
async fn misspelled_tool_gets_suggestions() {
    let (server, transport) = server_with(&[]);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": { "name": "list_control", "arguments": {} },
        }),
    )
    .await;

    let envelope = envelope_of(&response);
    assert_eq!(envelope["error"]["code"], "unknown_tool");
    assert_eq!(envelope["error"]["message"], "Unknown tool: list_control");
    let suggestions = envelope["error"]["details"]["suggestions"].as_array().unwrap();
    assert_eq!(suggestions[0], "list_controls");
    assert!(envelope["error"]["hint"].as_str().unwrap().contains("list_controls"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn schema_violations_are_rejected_before_dispatch() {
    let (server, transport) = server_with(&[]);

    for arguments in [
        json!({ "pageSize": "ten" }),
        json!({ "statusFilter": "BROKEN" }),
    ] {
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 6,
                "method": "tools/call",
                "params": { "name": "list_tests", "arguments": arguments },
            }),
        )
        .await;
        let envelope = envelope_of(&response);
        assert_eq!(envelope["error"]["code"], "validation_error", "{}", arguments);
        assert!(envelope["error"]["details"]["violations"].as_array().unwrap().len() >= 1);
    }

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": "get_control" },
        }),
    )
    .await;
    let envelope = envelope_of(&response);
    assert_eq!(envelope["error"]["code"], "validation_error");
    assert!(envelope["error"]["message"].as_str().unwrap().contains("controlId"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let (server, _) = server_with(&[]);

    let parse = serde_json::to_value(server.handle_line("{not json").await.unwrap()).unwrap();
    assert_eq!(parse["error"]["code"], -32700);
    assert_eq!(parse["id"], Value::Null);

    let invalid = serde_json::to_value(server.handle_line("[1,2]").await.unwrap()).unwrap();
    assert_eq!(invalid["error"]["code"], -32600);

    let unknown = call(&server, json!({ "jsonrpc": "2.0", "id": 8, "method": "resources/list" })).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let no_name = call(
        &server,
        json!({ "jsonrpc": "2.0", "id": 9, "method": "tools/call", "params": {} }),
    )
    .await;
    assert_eq!(no_name["error"]["code"], -32602);

    let bad_args = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 10,
            "method": "tools/call",
            "params": { "name": "list_people", "arguments": [1] },
        }),
    )
    .await;
    assert_eq!(bad_args["error"]["code"], -32602);
}

#[tokio::test]
async fn notifications_and_blank_lines_get_no_reply() {
    let (server, _) = server_with(&[]);

    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn serve_answers_each_request_line() {
    let (server, _) = server_with(&[]);
    let input = [
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }).to_string(),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string(),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }).to_string(),
    ]
    .join("\n");
    let mut output: Vec<u8> = Vec::new();

    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve");

    let lines = output_lines(output);
    assert_eq!(lines.len(), 2);
    let by_id = |id: i64| lines.iter().find(|line| line["id"] == id).cloned().unwrap();
    assert_eq!(by_id(1)["result"]["serverInfo"]["name"], "vanta-mcp");
    assert_eq!(by_id(2)["result"], json!({}));
}

#[tokio::test]
async fn slow_tool_call_does_not_block_later_requests() {
    let fake = FakeVanta::start().await;
    fake.enqueue(
        "GET",
        "/v1/controls",
        FakeResponse::json(200, json!({ "results": { "data": [] } }))
            .with_delay(Duration::from_millis(500)),
    );
    let config = test_config(&fake.base_url(), &[]);
    let app = App::initialize_with_logger(config, quiet_logger()).expect("app");
    let server = McpServer::new(Arc::new(app));
    let input = [
        json!({
            "jsonrpc": "2.0",
            "id": "slow",
            "method": "tools/call",
            "params": { "name": "list_controls", "arguments": {} },
        })
        .to_string(),
        json!({ "jsonrpc": "2.0", "id": "fast", "method": "ping" }).to_string(),
    ]
    .join("\n");
    let mut output: Vec<u8> = Vec::new();

    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve");

    let lines = output_lines(output);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], "fast");
    assert_eq!(lines[1]["id"], "slow");
    assert_eq!(envelope_of(&lines[1])["success"], true);
    assert_eq!(fake.calls("GET", "/v1/controls"), 1);
}

#[tokio::test]
async fn full_stack_call_authenticates_and_refreshes() {
    let fake = FakeVanta::start().await;
    fake.enqueue("GET", "/v1/controls/ctl-1", FakeResponse::json(401, json!({ "error": "expired" })));
    fake.enqueue("GET", "/v1/controls/ctl-1", FakeResponse::json(200, json!({ "id": "ctl-1", "name": "MFA" })));
    let config = test_config(&fake.base_url(), &[]);
    let app = App::initialize_with_logger(config, quiet_logger()).expect("app");
    app.prime().await.expect("prime");
    assert_eq!(fake.oauth_calls(), 1);
    let server = McpServer::new(Arc::new(app));

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 11,
            "method": "tools/call",
            "params": { "name": "get_control", "arguments": { "controlId": "ctl-1" } },
        }),
    )
    .await;

    let envelope = envelope_of(&response);
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["name"], "MFA");
    assert_eq!(fake.oauth_calls(), 2);
    assert_eq!(fake.calls("GET", "/v1/controls/ctl-1"), 2);
}

#[tokio::test]
async fn startup_fails_when_credentials_are_rejected() {
    let fake = FakeVanta::start().await;
    fake.enqueue_oauth(FakeResponse::json(401, json!({ "error": "invalid_client" })));
    let config = test_config(&fake.base_url(), &[]);
    let app = App::initialize_with_logger(config, quiet_logger()).expect("app");

    let err = app.prime().await.unwrap_err();

    assert!(err.to_string().starts_with("Failed to authenticate with Vanta"));
}
