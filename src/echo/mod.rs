//! Local stand-in for the notebook tool server.
//!
//! Speaks the same streamable HTTP dialect as the real child: sessions are
//! issued on `initialize` through the `mcp-session-id` header, every other
//! message must carry a known session, and replies are SSE framed.

pub mod rpc;
pub mod server;

use std::{collections::HashSet, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{bridge::rpc::SESSION_HEADER, errors::AppError, logging};
use rpc::{is_json_rpc_error, json_rpc_error};
use server::handle_json_rpc_value;

#[derive(Clone, Default)]
pub struct EchoState {
    sessions: Arc<Mutex<HashSet<String>>>,
}

pub fn build_echo_app() -> Router {
    Router::new()
        .route("/mcp", post(mcp_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(EchoState::default())
}

async fn mcp_endpoint(
    State(state): State<EchoState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return Ok(event_stream(&json_rpc_error(None, -32700, "Parse error"))),
    };

    let is_initialize = payload.get("method").and_then(Value::as_str) == Some("initialize");
    if !is_initialize {
        let known = match headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok()) {
            Some(session_id) => state.sessions.lock().await.contains(session_id),
            None => false,
        };
        if !known {
            return Err(AppError::bad_request(
                "missing_session",
                "Bad Request: No valid session ID provided",
            ));
        }
    }

    let Some(reply) = handle_json_rpc_value(payload) else {
        return Ok(StatusCode::ACCEPTED.into_response());
    };

    let mut response = event_stream(&reply);
    if is_initialize && !is_json_rpc_error(&reply) {
        let session_id = Uuid::new_v4().simple().to_string();
        let header_value = HeaderValue::from_str(&session_id)
            .map_err(|err| AppError::internal(format!("invalid session header: {err}")))?;
        state.sessions.lock().await.insert(session_id);
        response.headers_mut().insert(SESSION_HEADER, header_value);
        info!("echo session opened");
    }

    Ok(response)
}

fn event_stream(message: &Value) -> Response {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        format!("event: message\ndata: {message}\n\n"),
    )
        .into_response()
}
