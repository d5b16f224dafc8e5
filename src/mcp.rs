//! JSON-RPC plumbing for the [Model Context Protocol](https://spec.modelcontextprotocol.io/).
//!
//! The transport is line-delimited stdio: each stdin line is one JSON-RPC
//! 2.0 request, each response is one stdout line, flushed immediately.
//! Tool output itself never touches stdout outside a response, so the
//! stream stays parseable by the agent host.
//!
//! Four methods are served:
//!
//! | Method       | Purpose                                    |
//! |--------------|--------------------------------------------|
//! | `initialize` | Capability handshake and server identity   |
//! | `tools/list` | The static tool catalog                    |
//! | `tools/call` | Run one tool, return its text content      |
//! | `ping`       | Liveness check                             |
//!
//! Incoming notifications carry no id and get no reply; unknown ones are
//! logged to stderr and dropped.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::ResolvedConfig;
use crate::devices::DevicePool;
use crate::tools;

const SERVER_NAME: &str = "mcp-adb";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Run the MCP server on stdio, processing JSON-RPC requests until EOF.
pub async fn run_stdio(pool: DevicePool, config: ResolvedConfig) {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("mcp-adb: stdin read error: {}", e);
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                let response = json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": format!("Parse error: {}", e)
                    }
                });
                write_response(&mut stdout, &response).await;
                continue;
            }
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");

        // Notifications (no id) — acknowledge silently
        if id.is_none() {
            match method {
                "notifications/initialized" | "notifications/cancelled" => {}
                _ => {
                    eprintln!("mcp-adb: unknown notification: {}", method);
                }
            }
            continue;
        }

        let response = match method {
            "initialize" => handle_initialize(&request),
            "tools/list" => handle_tools_list(),
            "tools/call" => handle_tools_call(&request, &pool, &config).await,
            "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("Method not found: {}", method)
                }
            }),
        };

        // Inject the request id into the response
        let response = inject_id(response, id);
        write_response(&mut stdout, &response).await;
    }
}

/// Handle `initialize` — return protocol version, capabilities, and server info.
fn handle_initialize(request: &Value) -> Value {
    let _params = request.get("params");
    json!({
        "jsonrpc": "2.0",
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }
    })
}

/// Handle `tools/list` — the tool set is static, so this never changes.
fn handle_tools_list() -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "tools": tools::tool_definitions()
        }
    })
}

/// Handle `tools/call` — dispatch to the appropriate tool handler.
async fn handle_tools_call(request: &Value, pool: &DevicePool, config: &ResolvedConfig) -> Value {
    let params = request.get("params").cloned().unwrap_or(json!({}));
    let name = params.get("name").and_then(Value::as_str).unwrap_or("");
    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    let result = tools::handle_tool_call(name, &args, pool, config).await;

    let mut response_result = json!({
        "content": result.content
    });
    if result.is_error {
        response_result["isError"] = json!(true);
    }

    json!({
        "jsonrpc": "2.0",
        "result": response_result
    })
}

/// Inject the request `id` into a response object.
fn inject_id(mut response: Value, id: Option<Value>) -> Value {
    if let Some(id) = id {
        response["id"] = id;
    }
    response
}

/// Write a JSON-RPC response to stdout (one line, flushed immediately).
async fn write_response(stdout: &mut tokio::io::Stdout, response: &Value) {
    let mut output = serde_json::to_string(response).unwrap_or_default();
    output.push('\n');
    if let Err(e) = stdout.write_all(output.as_bytes()).await {
        eprintln!("mcp-adb: stdout write error: {}", e);
    }
    if let Err(e) = stdout.flush().await {
        eprintln!("mcp-adb: stdout flush error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_reports_server_info() {
        let response = handle_initialize(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        }));
        let result = &response["result"];
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn tools_list_returns_definitions() {
        let response = handle_tools_list();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert!(!tools.is_empty());
        assert!(tools.iter().any(|t| t["name"] == "shell_exec"));
    }

    #[test]
    fn inject_id_preserves_request_id() {
        let response = inject_id(json!({ "jsonrpc": "2.0", "result": {} }), Some(json!(7)));
        assert_eq!(response["id"], 7);
    }

    #[tokio::test]
    async fn tool_call_error_sets_is_error_flag() {
        let pool = DevicePool::new("adb", 5);
        let config = ResolvedConfig {
            adb_path: "adb".into(),
            default_timeout_secs: 5,
        };
        let request = json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "no_such_tool", "arguments": {} }
        });
        let response = handle_tools_call(&request, &pool, &config).await;
        assert_eq!(response["result"]["isError"], true);
    }
}
