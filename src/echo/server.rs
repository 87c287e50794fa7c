//! JSON-RPC method handling for the echo child.
//!
//! Decodes MCP messages, negotiates the protocol version on `initialize`, and
//! serves a single `echo` tool.

use rust_mcp_sdk::{
    macros,
    schema::{
        CallToolRequest, CallToolRequestParams, CallToolResult, ContentBlock, Implementation,
        InitializeRequest, InitializeResult, JsonrpcMessage, JsonrpcRequest, ListToolsRequest,
        ListToolsResult, PingRequest, ProtocolVersion, RequestId, ServerCapabilities,
        ServerCapabilitiesTools, TextContent, Tool,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result, value_to_request_id,
};
use crate::{errors::AppError, logging::redact_value};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

#[macros::mcp_tool(name = "echo", description = "Echoes back the input")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct EchoTool {
    pub message: Option<String>,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![EchoTool::tool()]
}

/// Handles one decoded message. Returns `None` for notifications.
pub fn handle_json_rpc_value(payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, -32600, "Invalid Request"));
    }

    let request_id = payload.get("id").and_then(value_to_request_id);
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, -32600, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            if let Err(error_response) = validate_request_shape(&request) {
                return Some(error_response);
            }

            if request.method.trim().is_empty() {
                return Some(json_rpc_error(Some(request.id), -32600, "Invalid Request"));
            }

            Some(handle_json_rpc_request(
                request.id,
                &request.method,
                request.params.map(Value::Object),
            ))
        }
        JsonrpcMessage::Notification(notification) => {
            info!(method = %notification.method, "notification received");
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(request_id, -32600, "Invalid Request"))
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let request_id = Some(request.id.clone());
    let Ok(payload) = serde_json::to_value(request) else {
        return Err(json_rpc_error(request_id, -32600, "Invalid Request"));
    };

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, -32602, "Invalid params"))
    }
}

pub fn handle_json_rpc_request(id: RequestId, method: &str, params: Option<Value>) -> Value {
    let audit_params = params.as_ref().map(redact_value).unwrap_or(Value::Null);

    let response = match method {
        "initialize" => {
            let protocol_version = match negotiate_protocol_version(params.as_ref()) {
                Ok(version) => version,
                Err(err) => return app_error_to_json_rpc(Some(id), err),
            };

            let initialize_result = InitializeResult {
                server_info: Implementation {
                    name: "echo-child".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: None,
                    description: None,
                    icons: vec![],
                    website_url: None,
                },
                capabilities: ServerCapabilities {
                    tools: Some(ServerCapabilitiesTools {
                        list_changed: Some(false),
                    }),
                    ..Default::default()
                },
                protocol_version: protocol_version.into(),
                instructions: None,
                meta: None,
            };

            json_rpc_result(
                id,
                serde_json::to_value(initialize_result).expect("initialize result serialization"),
            )
        }
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => json_rpc_result(
            id,
            serde_json::to_value(ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: build_tools_list(),
            })
            .expect("tools list result serialization"),
        ),
        "tools/call" => handle_tools_call(id, params),
        _ => json_rpc_error(Some(id), -32601, "Method not found"),
    };

    info!(
        method = %method,
        params = %audit_params,
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "echo request handled"
    );

    response
}

pub fn handle_tools_call(id: RequestId, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(Some(id), -32602, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(Some(id), -32602, "Invalid params"),
    };

    match tool_call.name.as_str() {
        "echo" => {
            let arguments: EchoTool =
                match serde_json::from_value(json!(tool_call.arguments.unwrap_or_default())) {
                    Ok(value) => value,
                    Err(_) => return json_rpc_error(Some(id), -32602, "Invalid params"),
                };

            let text = format!("Echo: {}", arguments.message.unwrap_or_default());
            json_rpc_result(
                id,
                serde_json::to_value(CallToolResult {
                    content: vec![ContentBlock::from(TextContent::new(text, None, None))],
                    is_error: None,
                    meta: None,
                    structured_content: None,
                })
                .expect("echo tool result serialization"),
            )
        }
        _ => json_rpc_error(Some(id), -32601, "Method not found"),
    }
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<ProtocolVersion, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if offered_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(AppError::bad_request(
            "unsupported_protocol_version",
            "unsupported initialize protocolVersion",
        ));
    }

    Ok(ProtocolVersion::V2024_11_05)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn negotiate_protocol_version_accepts_supported_version() {
        let params = json!({
            "protocolVersion": SUPPORTED_PROTOCOL_VERSION
        });

        let version = negotiate_protocol_version(Some(&params)).expect("supported version");
        assert_eq!(version, ProtocolVersion::V2024_11_05);
    }

    #[test]
    fn negotiate_protocol_version_rejects_unsupported_version() {
        let params = json!({
            "protocolVersion": "2026-01-01"
        });

        let error =
            negotiate_protocol_version(Some(&params)).expect_err("unsupported version must fail");
        assert!(error.to_string().contains("bad request"));
    }

    #[test]
    fn echo_tool_echoes_message() {
        let response = handle_json_rpc_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"message": "ping"}}
        }))
        .expect("request gets a response");

        assert_eq!(response["id"], json!(3));
        assert_eq!(response["result"]["content"][0]["text"], json!("Echo: ping"));
    }

    #[test]
    fn unknown_tool_is_method_not_found() {
        let response = handle_json_rpc_value(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "shout", "arguments": {}}
        }))
        .expect("request gets a response");

        assert_eq!(response["error"]["code"], json!(-32601));
    }

    #[test]
    fn tools_list_contains_echo() {
        let response = handle_json_rpc_value(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/list",
            "params": {}
        }))
        .expect("request gets a response");

        assert_eq!(response["result"]["tools"][0]["name"], json!("echo"));
        assert_eq!(
            response["result"]["tools"][0]["inputSchema"]["type"],
            json!("object")
        );
    }

    #[test]
    fn notifications_get_no_response() {
        let response = handle_json_rpc_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }));

        assert!(response.is_none());
    }

    #[test]
    fn non_object_payload_is_invalid_request() {
        let response = handle_json_rpc_value(json!([1, 2])).expect("error response");
        assert_eq!(response["error"]["code"], json!(-32600));
    }
}
