//! Integration tests for the MCP JSON-RPC surface: tool listing and full
//! tool-call round trips through `McpServer`.

use graphmem::config::{Config, StorageMode};
use graphmem::manager::ConnectionManager;
use graphmem::mcp::tools::get_tool_definitions;
use graphmem::mcp::McpServer;
use graphmem::metrics::NoopRecorder;
use graphmem::service::ToolService;
use serde_json::json;
use std::sync::Arc;

fn test_server() -> McpServer {
    let mut config = Config::default();
    config.storage = StorageMode::Single {
        url: ":memory:".to_string(),
        auth_token: None,
    };
    config.embedding_dims = 4;
    let manager = ConnectionManager::new(config);
    McpServer::new(ToolService::new(manager, None, Arc::new(NoopRecorder)))
}

#[test]
fn tool_surface_covers_the_seventeen_named_operations() {
    let tools = get_tool_definitions();
    assert_eq!(tools.len(), 17);
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    for expected in [
        "create_entities",
        "add_observations",
        "update_entities",
        "create_relations",
        "update_relations",
        "delete_entity",
        "delete_entities",
        "delete_relation",
        "delete_relations",
        "delete_observations",
        "open_nodes",
        "read_graph",
        "search_nodes",
        "neighbors",
        "walk",
        "shortest_path",
        "health_check",
    ] {
        assert!(
            names.contains(&expected),
            "tool definitions missing '{expected}'"
        );
    }
}

async fn call(server: &McpServer, id: i64, method: &str, params: serde_json::Value) -> serde_json::Value {
    let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    let raw = server.handle_message(&request.to_string()).await;
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn initialize_then_create_search_and_delete_round_trip() {
    let server = test_server();

    let init = call(&server, 1, "initialize", json!({})).await;
    assert_eq!(init["result"]["serverInfo"]["name"], "graphmem");

    let create = call(
        &server,
        2,
        "tools/call",
        json!({
            "name": "create_entities",
            "arguments": {
                "entities": [
                    {"name": "alice", "entityType": "person", "observations": ["likes rust"]}
                ]
            }
        }),
    )
    .await;
    assert!(create["error"].is_null(), "create_entities failed: {create}");

    let search = call(
        &server,
        3,
        "tools/call",
        json!({"name": "search_nodes", "arguments": {"query": "rust"}}),
    )
    .await;
    assert!(search["error"].is_null(), "search_nodes failed: {search}");
    let text = search["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("alice"), "search result missing alice: {text}");

    let delete = call(
        &server,
        4,
        "tools/call",
        json!({"name": "delete_entity", "arguments": {"name": "alice"}}),
    )
    .await;
    assert!(delete["error"].is_null(), "delete_entity failed: {delete}");

    let missing = call(
        &server,
        5,
        "tools/call",
        json!({"name": "open_nodes", "arguments": {"names": ["alice"]}}),
    )
    .await;
    assert!(missing["error"].is_null());
    let text = missing["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("0 entities"), "expected empty graph, got: {text}");
}

#[tokio::test]
async fn unknown_tool_name_is_rejected_as_invalid_params() {
    let server = test_server();
    let response = call(
        &server,
        1,
        "tools/call",
        json!({"name": "not_a_real_tool", "arguments": {}}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn malformed_json_line_yields_parse_error() {
    let server = test_server();
    let raw = server.handle_message("not json at all").await;
    let response: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(response["error"]["code"], -32700);
}
