//! JSON-RPC response builders for the echo child.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<RequestId>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            -32602,
            "Invalid params",
            Some(json!({
                "code": code,
                "message": message,
                "details": {}
            })),
        ),
        AppError::Internal { .. } => json_rpc_error(id, -32603, "Internal error"),
    }
}

pub fn json_rpc_error(id: Option<RequestId>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<RequestId>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id,
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: RequestId, result: Value) -> Value {
    let response = JsonrpcResultResponse::new(
        id,
        McpResult {
            meta: None,
            extra: result.as_object().cloned(),
        },
    );
    serde_json::to_value(response).expect("jsonrpc result response serialization")
}

/// Recovers the id of a message that failed to decode, so the error reply
/// can still be correlated.
pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bad_request_maps_to_invalid_params_with_detail() {
        let response = app_error_to_json_rpc(
            Some(RequestId::Integer(7)),
            AppError::bad_request("unsupported_protocol_version", "nope"),
        );

        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], json!(-32602));
        assert_eq!(
            response["error"]["data"]["code"],
            json!("unsupported_protocol_version")
        );
        assert!(is_json_rpc_error(&response));
    }

    #[test]
    fn undecodable_ids_are_recovered_when_scalar() {
        assert_eq!(
            value_to_request_id(&json!("req-1")),
            Some(RequestId::String("req-1".to_string()))
        );
        assert_eq!(value_to_request_id(&json!(9)), Some(RequestId::Integer(9)));
        assert!(value_to_request_id(&json!(1.5)).is_none());
    }

    #[test]
    fn result_keeps_string_id() {
        let response = json_rpc_result(RequestId::String("abc".to_string()), json!({"ok": true}));
        assert_eq!(response["id"], json!("abc"));
        assert_eq!(response["result"]["ok"], json!(true));
        assert!(!is_json_rpc_error(&response));
    }
}
