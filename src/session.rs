//! Session handshake with the child tool server.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bridge::rpc::{rpc_notification, rpc_request, RpcClient};
use crate::sse::{parse_sse_response, truncate_chars};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_PREVIEW_CHARS: usize = 16;

/// The current session token. Concurrent re-initializations are allowed and
/// the last writer wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    token: RwLock<Option<String>>,
}

impl SessionStore {
    pub async fn current(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    #[cfg(test)]
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    /// First characters of the token followed by `...`, for health output.
    pub async fn preview(&self) -> Option<String> {
        self.token
            .read()
            .await
            .as_deref()
            .map(|token| format!("{}...", truncate_chars(token, SESSION_PREVIEW_CHARS)))
    }
}

fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// Runs the `initialize` handshake and stores the issued session id.
/// Failures are logged and leave the store untouched.
pub async fn initialize_session(
    rpc: &RpcClient,
    store: &SessionStore,
    request_id: u64,
    timeout: Duration,
) -> Option<String> {
    info!(endpoint = %rpc.endpoint(), "initializing child session");
    let request = rpc_request(request_id, "initialize", initialize_params());

    let reply = match rpc.post(&request, None, timeout).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "session initialization failed");
            return None;
        }
    };

    if reply.status != StatusCode::OK {
        warn!(status = reply.status.as_u16(), "session initialization rejected");
        return None;
    }

    let Some(session_id) = reply.session_id else {
        warn!("child did not return a session id");
        return None;
    };

    store.set(session_id.clone()).await;
    info!(
        session = %truncate_chars(&session_id, SESSION_PREVIEW_CHARS),
        "child session initialized"
    );

    if let Some(capabilities) = parse_sse_response(&reply.body)
        .as_ref()
        .and_then(|data| data.get("result"))
        .map(|result| result.get("capabilities").cloned().unwrap_or_else(|| json!({})))
    {
        info!(capabilities = %capabilities, "child session capabilities");
    }

    let initialized = rpc_notification("notifications/initialized");
    match rpc.post(&initialized, Some(&session_id), timeout).await {
        Ok(reply) if reply.status.is_success() => {}
        Ok(reply) => debug!(
            status = reply.status.as_u16(),
            "initialized notification not acknowledged"
        ),
        Err(err) => debug!(error = %err, "initialized notification failed"),
    }

    Some(session_id)
}
