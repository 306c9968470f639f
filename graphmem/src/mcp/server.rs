//! MCP server implementation
//!
//! Implements the line-delimited stdio transport for the Model Context
//! Protocol, on top of tokio so a slow tool call never blocks the reader.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    MCP_PROTOCOL_VERSION,
};
use super::tools::{get_tool_definitions, handle_tool_call};
use crate::service::ToolService;

/// MCP server for graphmem
///
/// Implements the Model Context Protocol over stdio, exposing the
/// knowledge-graph tool surface to AI agents.
pub struct McpServer {
    service: ToolService,
}

impl McpServer {
    /// Wrap an existing tool service
    pub fn new(service: ToolService) -> Self {
        Self { service }
    }

    /// Run the MCP server on stdio
    ///
    /// This method runs until EOF is received on stdin or a read error
    /// occurs.
    pub async fn run(&self) -> crate::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();

        tracing::info!("graphmem MCP server started (protocol version {})", MCP_PROTOCOL_VERSION);

        loop {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("EOF received, shutting down");
                    break;
                }
                Err(e) => {
                    tracing::error!("read error: {e}");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("received: {line}");

            let response_json = self.handle_message(line).await;
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            tracing::debug!("sent: {response_json}");
        }

        Ok(())
    }

    /// Handle one raw JSON-RPC message and return the serialized response.
    ///
    /// Shared by the stdio loop above and by out-of-process transports (the
    /// HTTP event-stream binding lives in the reference binary) that parse
    /// framing themselves but want the same dispatch logic.
    pub async fn handle_message(&self, line: &str) -> String {
        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                JsonRpcResponse::error(None, JsonRpcError::parse_error(format!("parse error: {e}")))
            }
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                "{{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{{\"code\":-32603,\"message\":\"serialize error: {e}\"}}}}"
            )
        })
    }

    /// Handle a single JSON-RPC request
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "notifications/initialized" => {
                return JsonRpcResponse::success(request.id, json!({}));
            }
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "ping" => Ok(json!({})),
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    fn handle_initialize(&self, _params: &Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let capabilities = ServerCapabilities::default();
        let server_info = ServerInfo::default();

        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": server_info
        }))
    }

    fn handle_tools_list(&self) -> std::result::Result<Value, JsonRpcError> {
        let tools = get_tool_definitions();
        Ok(json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params = params
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;

        let tool_name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JsonRpcError::invalid_params("missing tool name"))?;

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = handle_tool_call(&self.service, tool_name, &arguments).await?;

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageMode};
    use crate::manager::ConnectionManager;
    use crate::metrics::NoopRecorder;
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
    fn test_initialize_response() {
        let server = test_server();
        let result = server.handle_initialize(&None).unwrap();

        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"].is_object());
        assert_eq!(result["serverInfo"]["name"], "graphmem");
    }

    #[test]
    fn test_tools_list() {
        let server = test_server();
        let result = server.handle_tools_list().unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 17);
    }

    #[tokio::test]
    async fn test_tools_call_health_check() {
        let server = test_server();
        let params = json!({"name": "health_check", "arguments": {}});
        let result = server.handle_tools_call(&Some(params)).await.unwrap();
        assert!(result["content"].is_array());
    }

    #[tokio::test]
    async fn test_tools_call_missing_name() {
        let server = test_server();
        let params = json!({"arguments": {}});
        let result = server.handle_tools_call(&Some(params)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = test_server();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "unknown/method".to_string(),
            params: None,
        };

        let response = server.handle_request(request).await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_ping() {
        let server = test_server();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "ping".to_string(),
            params: None,
        };

        let response = server.handle_request(request).await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_notification_initialized() {
        let server = test_server();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "notifications/initialized".to_string(),
            params: None,
        };

        let response = server.handle_request(request).await;
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }
}
