//! Integration tests for the MCP server.
//!
//! Each session runs the server on its own thread over in-memory pipes while
//! the test thread plays the host's main thread, draining bridge requests into
//! a simulated design.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use fusion360_mcp::bridge::{wake, Bridge};
use fusion360_mcp::host::{CapabilityTable, Design, SimulatedHost};
use fusion360_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use fusion360_mcp::mcp::{McpServer, Transport};

// =============================================================================
// Session harness
// =============================================================================

/// Feeds `messages` to a fresh server and returns every line it wrote.
fn run_session(messages: &[Value]) -> Vec<Value> {
    let (signal, mut main_loop) = wake::channel();
    let bridge = Arc::new(Bridge::new(signal.clone()));

    let mut table = CapabilityTable::new(SimulatedHost::new(Design::sample()))
        .with_screenshot_size(16, 12);
    let drain = Arc::clone(&bridge);
    main_loop.on_notify(move || {
        drain.drain_and_execute(&mut table);
    });

    let input: String = messages.iter().map(|m| format!("{m}\n")).collect();
    let server = thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let output = runtime.block_on(async move {
            let (server_side, mut client_side) = tokio::io::duplex(1 << 20);
            let serve = async move {
                let transport = Transport::new(input.as_bytes(), server_side);
                let mut server = McpServer::new(bridge, Duration::from_secs(5), transport);
                server.serve().await.unwrap();
            };
            let collect = async move {
                let mut output = String::new();
                client_side.read_to_string(&mut output).await.unwrap();
                output
            };
            tokio::join!(serve, collect).1
        });
        signal.close();
        output
    });

    main_loop.run();
    let output = server.join().unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn request(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

fn handshake() -> Vec<Value> {
    vec![
        request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0.0" }
            }),
        ),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    ]
}

fn call(id: i64, tool: &str, arguments: Value) -> Value {
    request(id, "tools/call", json!({ "name": tool, "arguments": arguments }))
}

/// Text of the first content item, and whether the result is an error.
fn tool_text(response: &Value) -> (&str, bool) {
    let result = &response["result"];
    (
        result["content"][0]["text"].as_str().unwrap_or_default(),
        result["isError"].as_bool().unwrap_or(false),
    )
}

fn tool_json(response: &Value) -> Value {
    let (text, is_error) = tool_text(response);
    assert!(!is_error, "tool failed: {text}");
    serde_json::from_str(text).unwrap()
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0.0" }
        }
    }"#;

    let IncomingMessage::Request(req) = parse_message(json).unwrap() else {
        panic!("Expected Request");
    };
    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, RequestId::Number(1));
}

#[test]
fn test_parse_tool_call_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": "call-1",
        "method": "tools/call",
        "params": { "name": "fusion360_bodies", "arguments": {} }
    }"#;

    let IncomingMessage::Request(req) = parse_message(json).unwrap() else {
        panic!("Expected Request");
    };
    assert_eq!(req.id, RequestId::String("call-1".to_string()));
    assert_eq!(req.params.unwrap()["name"], "fusion360_bodies");
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_lifecycle_and_tool_listing() {
    let mut messages = handshake();
    messages.push(request(2, "tools/list", json!({})));
    messages.push(request(3, "ping", json!({})));

    let responses = run_session(&messages);
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "fusion360-mcp");

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 18);
    assert!(tools.iter().all(|t| t["name"].as_str().unwrap().starts_with("fusion360_")));

    assert_eq!(responses[2]["result"], json!({}));
}

#[test]
fn test_requests_before_initialisation_are_rejected() {
    let responses = run_session(&[
        request(1, "tools/list", json!({})),
        call(2, "fusion360_health", json!({})),
    ]);
    assert_eq!(responses.len(), 2);
    for response in &responses {
        assert_eq!(response["error"]["code"], -32600);
    }
}

#[test]
fn test_malformed_lines_get_error_responses() {
    let mut messages = handshake();
    messages.push(json!("not an object"));
    messages.push(request(2, "resources/list", json!({})));

    let responses = run_session(&messages);
    assert_eq!(responses[1]["error"]["code"], -32700);
    assert_eq!(responses[2]["error"]["code"], -32601);
    assert_eq!(responses[2]["id"], 2);
}

#[test]
fn test_health_is_answered_by_the_server() {
    let mut messages = handshake();
    messages.push(call(2, "fusion360_health", json!({})));

    let responses = run_session(&messages);
    let health = tool_json(&responses[1]);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["pending_requests"], 0);
}

#[test]
fn test_read_tools_reach_the_host() {
    let mut messages = handshake();
    messages.push(call(2, "fusion360_document_info", json!({})));
    messages.push(call(3, "fusion360_components", json!({})));
    messages.push(call(4, "fusion360_body_details", json!({ "name": "Bracket Body" })));
    messages.push(call(5, "fusion360_parameters", json!({})));
    messages.push(call(6, "fusion360_list_versions", json!({})));

    let responses = run_session(&messages);
    assert_eq!(responses.len(), 6);

    assert_eq!(tool_json(&responses[1])["name"], "Bracket Assembly");
    assert_eq!(tool_json(&responses[2])["total_components"], 2);
    assert_eq!(tool_json(&responses[3])["bodies"][0]["component"], "Bracket");
    assert_eq!(tool_json(&responses[4])["count"], 3);
    assert_eq!(tool_json(&responses[5])["current_version"], 3);
}

#[test]
fn test_modelling_workflow_keeps_state_between_calls() {
    let mut messages = handshake();
    messages.push(call(2, "fusion360_create_sketch", json!({ "plane": "XY" })));
    messages.push(call(
        3,
        "fusion360_draw_rectangle",
        json!({ "sketch_name": "Sketch3", "x2": 2.0, "y2": 2.0 }),
    ));
    messages.push(call(
        4,
        "fusion360_extrude",
        json!({ "sketch_name": "Sketch3", "distance": 0.5 }),
    ));
    messages.push(call(5, "fusion360_bodies", json!({})));

    let responses = run_session(&messages);

    assert_eq!(tool_json(&responses[1])["sketch_name"], "Sketch3");
    assert_eq!(tool_json(&responses[2])["success"], true);
    assert_eq!(tool_json(&responses[3])["feature_name"], "Extrude3");

    let bodies = tool_json(&responses[4]);
    let new_body = bodies["bodies"]
        .as_array()
        .unwrap()
        .iter()
        .find(|body| body["name"] == "Body3")
        .unwrap();
    assert_eq!(new_body["component"], "Bracket Assembly");
    assert_eq!(new_body["volume_cm3"], 2.0);
}

#[test]
fn test_host_failures_are_tool_errors() {
    let mut messages = handshake();
    messages.push(call(2, "fusion360_sketch_details", json!({ "name": "Nope" })));
    messages.push(call(3, "fusion360_restore_version", json!({ "version_number": 42 })));
    messages.push(call(4, "fusion360_run_script", json!({ "code": "result = 1" })));
    messages.push(call(5, "fusion360_sketch_details", json!({})));
    messages.push(call(6, "fusion360_fly", json!({})));

    let responses = run_session(&messages);

    assert_eq!(
        tool_text(&responses[1]),
        ("API call failed: Sketch 'Nope' not found", true)
    );
    assert_eq!(
        tool_text(&responses[2]),
        ("API call failed: Version '42' not found", true)
    );
    let (script, is_error) = tool_text(&responses[3]);
    assert!(is_error);
    assert!(script.contains("live Fusion 360 host"));
    assert_eq!(
        tool_text(&responses[4]),
        ("Missing required argument: name", true)
    );
    assert_eq!(tool_text(&responses[5]), ("Unknown tool: fusion360_fly", true));
}

#[test]
fn test_screenshot_returns_png_image_content() {
    let mut messages = handshake();
    messages.push(call(2, "fusion360_screenshot", json!({})));
    messages.push(call(3, "fusion360_screenshot", json!({ "width": 0 })));

    let responses = run_session(&messages);

    let content = &responses[1]["result"]["content"][0];
    assert_eq!(content["type"], "image");
    assert_eq!(content["mimeType"], "image/png");
    assert!(!content["data"].as_str().unwrap().is_empty());

    let (text, is_error) = tool_text(&responses[2]);
    assert!(is_error);
    assert!(text.contains("width"));
}
