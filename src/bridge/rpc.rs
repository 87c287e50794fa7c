//! JSON-RPC over HTTP transport to the child's `/mcp` endpoint.

use std::time::Duration;

use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

pub const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_JSON_AND_EVENT_STREAM: &str = "application/json, text/event-stream";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("request to child timed out")]
    Timeout,
    #[error("{0}")]
    Transport(reqwest::Error),
    #[error("child returned HTTP {status}")]
    Status { status: StatusCode, body: String },
    #[error("child response could not be parsed")]
    Parse,
    #[error("child response did not include a tool list")]
    MissingTools,
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcReply {
    pub status: StatusCode,
    pub session_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POSTs one JSON-RPC message. Any HTTP status is returned as a reply;
    /// only transport failures and timeouts are errors.
    pub async fn post(
        &self,
        payload: &Value,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<RpcReply, BridgeError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .header(header::ACCEPT, ACCEPT_JSON_AND_EVENT_STREAM)
            .json(payload);

        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;
        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        let method = payload.get("method").and_then(Value::as_str).unwrap_or_default();
        debug!(
            endpoint = %self.endpoint,
            method,
            status = status.as_u16(),
            "child replied"
        );

        Ok(RpcReply {
            status,
            session_id,
            body,
        })
    }
}

pub fn rpc_request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

pub fn rpc_notification(method: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method
    })
}
