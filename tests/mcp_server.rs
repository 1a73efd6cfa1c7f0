//! Tool server protocol tests.
//!
//! Drives the server through `handle_message` the way a stdio client would.

use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use slackline_lib::cache::CacheStore;
use slackline_lib::mcp::error::codes;
use slackline_lib::mcp::{McpServer, ToolContext};
use slackline_lib::slack::AuthIdentity;
use slackline_lib::AppContext;

fn request(id: u64, method: &str, params: Option<Value>) -> String {
    let mut req = json!({"jsonrpc": "2.0", "id": id, "method": method});
    if let Some(params) = params {
        req["params"] = params;
    }
    req.to_string()
}

fn init_params() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {},
        "clientInfo": {"name": "test-client", "version": "1.0.0"}
    })
}

fn server(dir: &TempDir, ctx: AppContext) -> McpServer {
    McpServer::new(ToolContext::new(
        ctx,
        CacheStore::new(dir.path().join("cache.json"), Duration::from_secs(3600)),
    ))
}

async fn call(server: &McpServer, message: String) -> Value {
    let response = server
        .handle_message(&message)
        .await
        .expect("request should get a response");
    serde_json::to_value(response).unwrap()
}

async fn initialized(dir: &TempDir, ctx: AppContext) -> McpServer {
    let server = server(dir, ctx);
    let resp = call(&server, request(1, "initialize", Some(init_params()))).await;
    assert!(resp.get("error").is_none(), "initialize failed: {resp}");
    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    assert!(server
        .handle_message(&notification.to_string())
        .await
        .is_none());
    server
}

#[tokio::test]
async fn test_initialize_handshake() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir, AppContext::default());

    let resp = call(&server, request(1, "initialize", Some(init_params()))).await;

    assert_eq!(resp["jsonrpc"], "2.0");
    assert_eq!(resp["id"], 1);
    assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(resp["result"]["serverInfo"]["name"], "slackline");
    assert!(resp["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list_before_initialize_fails() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir, AppContext::default());

    let resp = call(&server, request(1, "tools/list", None)).await;
    assert_eq!(resp["error"]["code"], codes::INTERNAL_ERROR);
}

#[tokio::test]
async fn test_tools_list() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(&server, request(2, "tools/list", None)).await;
    let tools = resp["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();

    assert!(names.contains(&"get_current_datetime"));
    assert!(names.contains(&"get_user_profile"));
    assert!(names.contains(&"auth_status"));
    for tool in tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn test_datetime_tool_returns_rfc3339() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(
        &server,
        request(
            3,
            "tools/call",
            Some(json!({"name": "get_current_datetime", "arguments": {}})),
        ),
    )
    .await;

    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok(), "{text}");
    assert_eq!(resp["result"]["isError"], false);
}

#[tokio::test]
async fn test_unknown_tool_is_method_not_found() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(
        &server,
        request(4, "tools/call", Some(json!({"name": "does_not_exist"}))),
    )
    .await;
    assert_eq!(resp["error"]["code"], codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_method() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(&server, request(5, "resources/list", None)).await;
    assert_eq!(resp["error"]["code"], codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_auth_status_reflects_context() {
    let dir = TempDir::new().unwrap();
    let mut ctx = AppContext::new(Some("https://acme.slack.com/".into()), false);
    ctx.set_identity(AuthIdentity::new().with_user("jane").with_team("Acme"));
    let server = initialized(&dir, ctx).await;

    let resp = call(
        &server,
        request(6, "tools/call", Some(json!({"name": "auth_status"}))),
    )
    .await;

    let text = resp["result"]["content"][0]["text"].as_str().unwrap();
    let status: Value = serde_json::from_str(text).unwrap();
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["workspace"], "https://acme.slack.com/");
    assert_eq!(status["user"], "jane");
}

#[tokio::test]
async fn test_user_profile_without_credentials() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(
        &server,
        request(
            7,
            "tools/call",
            Some(json!({"name": "get_user_profile", "arguments": {"user_id": "U1"}})),
        ),
    )
    .await;
    assert_eq!(resp["error"]["code"], codes::NOT_AUTHENTICATED);
}

#[tokio::test]
async fn test_ping_and_shutdown() {
    let dir = TempDir::new().unwrap();
    let server = initialized(&dir, AppContext::default()).await;

    let resp = call(&server, request(8, "ping", None)).await;
    assert_eq!(resp["result"], json!({}));

    let resp = call(&server, request(9, "shutdown", None)).await;
    assert_eq!(resp["result"], json!({}));
    assert_eq!(
        server.state().await,
        slackline_lib::mcp::ServerState::ShuttingDown
    );
}
