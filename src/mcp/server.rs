//! Line-delimited JSON-RPC server

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;

use super::error::{codes, Result};
use super::protocol::{
    InitializeParams, InitializeResult, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, McpMessage, ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
};
use super::tools::{ToolContext, ToolRegistry};

/// Protocol version announced in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "slackline";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for `initialize`
    Uninitialized,
    /// Serving tool calls
    Ready,
    /// `shutdown` or `exit` received
    ShuttingDown,
}

/// Tool server
pub struct McpServer {
    state: RwLock<ServerState>,
    tools: ToolRegistry,
}

impl McpServer {
    /// Creates a server exposing the built-in tools over `context`
    pub fn new(context: ToolContext) -> Self {
        Self {
            state: RwLock::new(ServerState::Uninitialized),
            tools: ToolRegistry::new(context),
        }
    }

    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs the server on stdin and stdout
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    /// Serves one message per line until end of input or shutdown
    ///
    /// The cache envelope is saved once the loop ends, whichever way.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("Tool server starting");

        let served = self.serve_lines(reader, &mut writer).await;
        let saved = self.tools.context().save_cache().await;

        tracing::info!("Tool server shutting down");
        served?;
        saved
    }

    async fn serve_lines<R, W>(&self, mut reader: R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::debug!("Received: {}", line);
                    self.handle_message(line).await
                }
                Err(e) => {
                    tracing::warn!("Dropping line that is not UTF-8: {}", e);
                    Some(JsonRpcResponse::error(
                        None,
                        codes::PARSE_ERROR,
                        format!("parse error: {}", e),
                    ))
                }
            };

            if let Some(response) = response {
                let mut json = serde_json::to_string(&response)?;
                tracing::debug!("Sending: {}", json);
                json.push('\n');
                writer.write_all(json.as_bytes()).await?;
                writer.flush().await?;
            }

            if self.state().await == ServerState::ShuttingDown {
                break;
            }
        }

        Ok(())
    }

    /// Handles one incoming message; notifications get no response
    pub async fn handle_message(&self, json: &str) -> Option<JsonRpcResponse> {
        match McpMessage::parse(json) {
            Ok(McpMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(McpMessage::Notification(notification)) => {
                self.handle_notification(notification).await;
                None
            }
            Ok(McpMessage::Response(_)) => None,
            Err(e) => Some(JsonRpcResponse::error(None, e.code(), e.to_string())),
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params).await,
            "tools/list" => self.handle_tools_list(id).await,
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "shutdown" => {
                *self.state.write().await = ServerState::ShuttingDown;
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            _ => JsonRpcResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("method not found: {}", request.method),
            ),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcRequest) {
        match notification.method.as_str() {
            "notifications/initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => tracing::debug!("Request cancelled by client"),
            "exit" => *self.state.write().await = ServerState::ShuttingDown,
            _ => tracing::debug!("Unknown notification: {}", notification.method),
        }
    }

    async fn handle_initialize(
        &self,
        id: Option<JsonRpcId>,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params = match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid initialize params: {}", e),
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    "initialize params required",
                );
            }
        };

        tracing::info!(
            "Initializing for {} {} (protocol {})",
            params.client_info.name,
            params.client_info.version,
            params.protocol_version
        );
        *self.state.write().await = ServerState::Ready;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.into(),
                version: SERVER_VERSION.into(),
            },
        };

        JsonRpcResponse::success(id, result)
    }

    async fn handle_tools_list(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        if self.state().await != ServerState::Ready {
            return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "server not initialized");
        }

        JsonRpcResponse::success(
            id,
            ListToolsResult {
                tools: self.tools.list_tools(),
            },
        )
    }

    async fn handle_tools_call(
        &self,
        id: Option<JsonRpcId>,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        if self.state().await != ServerState::Ready {
            return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "server not initialized");
        }

        let params = match params.map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid tool call params: {}", e),
                );
            }
            None => {
                return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "tool call params required");
            }
        };

        match self.tools.execute(&params.name, params.arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                tracing::error!("Tool {} failed: {}", params.name, e);
                JsonRpcResponse::error(id, e.code(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::context::AppContext;
    use std::time::Duration;
    use tempfile::TempDir;

    const INIT: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1.0"}}}"#;

    fn server_in(dir: &TempDir) -> McpServer {
        McpServer::new(ToolContext::new(
            AppContext::default(),
            CacheStore::new(dir.path().join("cache.json"), Duration::from_secs(60)),
        ))
    }

    #[tokio::test]
    async fn test_initialize_moves_to_ready() {
        let dir = TempDir::new().unwrap();
        let server = server_in(&dir);
        assert_eq!(server.state().await, ServerState::Uninitialized);

        let resp = server.handle_message(INIT).await.unwrap();
        assert!(resp.error.is_none());
        assert_eq!(server.state().await, ServerState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_without_params() {
        let dir = TempDir::new().unwrap();
        let server = server_in(&dir);

        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();
        assert_eq!(resp.error.map(|e| e.code), Some(codes::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_parse_error() {
        let dir = TempDir::new().unwrap();
        let server = server_in(&dir);

        let resp = server.handle_message("{oops").await.unwrap();
        assert_eq!(resp.error.map(|e| e.code), Some(codes::PARSE_ERROR));
    }

    #[tokio::test]
    async fn test_run_stops_at_shutdown_and_saves_cache() {
        let dir = TempDir::new().unwrap();
        let server = server_in(&dir);
        server
            .tools()
            .context()
            .app
            .lock()
            .await
            .attach_cache(Default::default());

        let input = format!(
            "{}\n\n{}\n{}\n",
            INIT,
            r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
        );
        let mut output = Vec::new();
        server.run(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["id"], 2);
        assert!(dir.path().join("cache.json").exists());
    }

    #[tokio::test]
    async fn test_run_answers_invalid_utf8_and_keeps_serving() {
        let dir = TempDir::new().unwrap();
        let server = server_in(&dir);

        let mut input = b"\xff\xfe\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#);
        input.push(b'\n');

        let mut output = Vec::new();
        server.run(&input[..], &mut output).await.unwrap();

        let responses: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], codes::PARSE_ERROR);
        assert_eq!(responses[0]["id"], serde_json::Value::Null);
        assert_eq!(responses[1]["id"], 7);
        assert_eq!(responses[1]["result"], serde_json::json!({}));
    }
}
