use std::io::{self, BufRead, BufReader, Write};

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::backend::{HttpBackend, SearchBackend};
use crate::config::ServerConfig;
use crate::error::{
    ToolError, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::executor::ToolExecutor;
use crate::normalize::normalize_arguments;
use crate::registry::ToolRegistry;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "elastic-mcp";

pub fn run_mcp_stdio(config: ServerConfig) -> Result<()> {
    tracing::info!(es_url = %config.es_url, "starting MCP stdio server");
    let server = McpServer::new(HttpBackend::new(&config), &config);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    server.serve(&mut reader, &mut writer)
}

/// Line-delimited JSON-RPC front-end over the tool registry and executor.
///
/// Requests are handled one at a time in arrival order. Every request line
/// gets exactly one response line; notifications get none.
pub struct McpServer<B> {
    registry: ToolRegistry,
    executor: ToolExecutor<B>,
}

impl<B: SearchBackend> McpServer<B> {
    pub fn new(backend: B, config: &ServerConfig) -> Self {
        Self {
            registry: ToolRegistry::new(),
            executor: ToolExecutor::new(backend, config),
        }
    }

    pub fn serve(&self, reader: &mut impl BufRead, writer: &mut impl Write) -> Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .context("failed to read request line")?;
            if n == 0 {
                break;
            }

            if let Some(response) = self.handle_line(&line) {
                write_line(writer, &response)?;
            }
        }

        tracing::info!("input closed, shutting down");
        Ok(())
    }

    pub fn handle_line(&self, line: &[u8]) -> Option<Value> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(err) => {
                tracing::warn!(error = %err, "request line is not valid UTF-8");
                return Some(error_response(
                    Value::Null,
                    PARSE_ERROR,
                    &format!("Parse error: {err}"),
                ));
            }
        };
        if text.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle_message(message),
            Err(err) => {
                tracing::warn!(error = %err, "malformed request line");
                Some(error_response(
                    Value::Null,
                    PARSE_ERROR,
                    &format!("Parse error: {err}"),
                ))
            }
        }
    }

    fn handle_message(&self, message: Value) -> Option<Value> {
        let Value::Object(envelope) = message else {
            return Some(error_response(
                Value::Null,
                INVALID_REQUEST,
                "Invalid request: expected a JSON object",
            ));
        };

        let id = envelope.get("id").cloned();
        let Some(method) = envelope.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid request: missing string field `method`",
            ));
        };
        let Some(id) = id else {
            tracing::debug!(method, "notification received");
            return None;
        };

        Some(self.handle_request(method, envelope.get("params"), id))
    }

    fn handle_request(&self, method: &str, params: Option<&Value>, id: Value) -> Value {
        tracing::debug!(method, %id, "request received");
        match method {
            "initialize" => success_response(id, initialize_result()),
            "ping" => success_response(id, json!({})),
            "tools/list" => {
                success_response(id, json!({ "tools": self.registry.descriptors() }))
            }
            "tools/call" => self.handle_tool_call(params, id),
            _ => error_response(id, METHOD_NOT_FOUND, &format!("Method not found: `{method}`")),
        }
    }

    fn handle_tool_call(&self, params: Option<&Value>, id: Value) -> Value {
        let Some(params) = params.filter(|params| params.is_object()) else {
            return error_response(id, INVALID_PARAMS, "Missing params for tools/call");
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, INVALID_PARAMS, "tools/call requires string field `name`");
        };

        match self.call_tool(tool_name, params.get("arguments")) {
            Ok(result) => success_response(id, tool_ok(&result)),
            Err(err) => {
                tracing::warn!(tool = tool_name, kind = err.kind(), "tool call failed");
                tool_error_response(id, &err)
            }
        }
    }

    fn call_tool(&self, tool_name: &str, raw_args: Option<&Value>) -> Result<Value, ToolError> {
        let descriptor = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::unknown_tool(tool_name))?;
        let args = normalize_arguments(raw_args, descriptor.kind)?;
        self.executor.execute(tool_name, &args)
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tool_ok(result: &Value) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": serde_json::to_string_pretty(result)
                    .unwrap_or_else(|_| "{}".to_string())
            }
        ]
    })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

fn tool_error_response(id: Value, err: &ToolError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": err.code(),
            "message": err.to_string(),
            "data": err.data()
        }
    })
}

fn write_line(writer: &mut impl Write, payload: &Value) -> Result<()> {
    serde_json::to_writer(&mut *writer, payload).context("failed to encode response")?;
    writer.write_all(b"\n")?;
    writer.flush().context("failed to flush response")?;
    Ok(())
}
