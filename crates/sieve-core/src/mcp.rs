//! MCP Server - Model Context Protocol request handling
//! JSON-RPC 2.0; the transport (stdio in the CLI) lives with the caller

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sieve_sandbox::{ExecutionResult, Executor};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::tools::{self, ToolError};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// Tools returned by `tools/list` when a query is given
const DISCOVERY_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

pub struct McpServer {
    executor: Arc<Executor>,
    name: String,
    version: String,
}

impl McpServer {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            executor,
            name: "sieve".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Handle one raw frame. `None` means nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC frame");
                Some(JsonRpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "MCP request");

        // Notifications never get a reply, whatever the method
        let id = request.id?;

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::err(
                id,
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            ));
        }

        let params = request.params.unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::ok(id, self.initialize_result()),
            "ping" => JsonRpcResponse::ok(id, json!({})),
            "tools/list" => JsonRpcResponse::ok(id, list_tools(&params)),
            "tools/call" => self.call_tool(id, &params).await,
            other => JsonRpcResponse::err(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            }
        })
    }

    async fn call_tool(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(|n| n.as_str()) else {
            return JsonRpcResponse::err(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        match tools::call_tool(&self.executor, name, &arguments).await {
            Ok(result) => JsonRpcResponse::ok(id, result_content(&result)),
            Err(ToolError::UnknownTool(name)) => {
                JsonRpcResponse::err(id, INVALID_PARAMS, format!("Unknown tool: {}", name))
            }
            Err(e) => JsonRpcResponse::ok(id, error_content(&e.to_string())),
        }
    }
}

/// `tools/list`, optionally narrowed by a non-standard `query` param
fn list_tools(params: &Value) -> Value {
    let tools = match params.get("query").and_then(|q| q.as_str()) {
        Some(query) => tools::discover(query, DISCOVERY_LIMIT),
        None => tools::builtin_tools(),
    };
    json!({ "tools": tools })
}

fn result_content(result: &ExecutionResult) -> Value {
    let text = serde_json::to_string_pretty(result).unwrap_or_default();
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": !result.success
    })
}

fn error_content(message: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": message }],
        "isError": true
    })
}
