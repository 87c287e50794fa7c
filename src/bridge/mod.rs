//! Bridge that relays tool listings and tool calls to the child process.
//!
//! Every failure is folded into a [`ToolCallOutcome`] or a fallback
//! [`ToolCatalog`]; nothing here is fatal to the facade.

pub mod catalog;
pub mod rpc;

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::logging::redact_value;
use crate::session::{initialize_session, SessionStore};
use crate::sse::{parse_sse_response, truncate_chars};
use crate::supervisor::ChildMonitor;

use catalog::{ToolCatalog, ToolDescriptor};
use rpc::{rpc_request, BridgeError, RpcClient, RpcReply};

const ERROR_DETAIL_CHARS: usize = 500;
pub const DISABLED_MESSAGE: &str =
    "NotebookLM MCP is not enabled. Set ENABLE_NOTEBOOKLM_MCP=true and provide NOTEBOOKLM_NOTEBOOK_ID.";
pub const DISABLED_HINT: &str =
    "Run: notebooklm-mcp init https://notebooklm.google.com/notebook/YOUR_ID";
pub const NOT_RUNNING_MESSAGE: &str = "NotebookLM MCP server is not running";
pub const TIMED_OUT_MESSAGE: &str = "MCP call timed out";
pub const UNPARSABLE_MESSAGE: &str = "Failed to parse MCP response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTimeouts {
    pub initialize: Duration,
    pub list: Duration,
    pub call: Duration,
}

impl Default for BridgeTimeouts {
    fn default() -> Self {
        Self {
            initialize: Duration::from_secs(30),
            list: Duration::from_secs(10),
            call: Duration::from_secs(60),
        }
    }
}

/// Result payload of a tool invocation as returned to facade callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ToolCallOutcome {
    pub fn succeeded(tool: &str, result: Value) -> Self {
        Self {
            success: true,
            tool: Some(tool.to_string()),
            result: Some(result),
            error: None,
            details: None,
            hint: None,
        }
    }

    pub fn failed(error: impl Into<Value>) -> Self {
        Self {
            success: false,
            tool: None,
            result: None,
            error: Some(error.into()),
            details: None,
            hint: None,
        }
    }

    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tool = Some(tool.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[cfg(test)]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(Value::as_str)
    }
}

pub struct ToolBridge {
    rpc: RpcClient,
    session: SessionStore,
    monitor: Arc<dyn ChildMonitor>,
    enabled: bool,
    timeouts: BridgeTimeouts,
    next_id: AtomicU64,
}

impl ToolBridge {
    pub fn new(rpc: RpcClient, monitor: Arc<dyn ChildMonitor>, enabled: bool) -> Self {
        Self {
            rpc,
            session: SessionStore::default(),
            monitor,
            enabled,
            timeouts: BridgeTimeouts::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeouts(mut self, timeouts: BridgeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn child_running(&self) -> bool {
        self.monitor.is_running().await
    }

    #[cfg(test)]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn session_preview(&self) -> Option<String> {
        self.session.preview().await
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn initialize_session(&self) -> Option<String> {
        initialize_session(
            &self.rpc,
            &self.session,
            self.next_request_id(),
            self.timeouts.initialize,
        )
        .await
    }

    /// Live catalog from the child, or the built-in one when the child is
    /// not running or does not answer with a usable list.
    pub async fn list_tools(&self) -> ToolCatalog {
        if self.monitor.is_running().await {
            match self.fetch_live_tools().await {
                Ok(tools) => return ToolCatalog::live(tools),
                Err(err) => warn!(error = %err, "serving fallback tool catalog"),
            }
        }

        ToolCatalog::fallback()
    }

    async fn fetch_live_tools(&self) -> Result<Vec<ToolDescriptor>, BridgeError> {
        let session_id = self.session.current().await;
        let request = rpc_request(self.next_request_id(), "tools/list", json!({}));
        let reply = self
            .rpc
            .post(&request, session_id.as_deref(), self.timeouts.list)
            .await?;

        if reply.status != StatusCode::OK {
            return Err(BridgeError::Status {
                status: reply.status,
                body: truncate_chars(&reply.body, ERROR_DETAIL_CHARS),
            });
        }

        let data = parse_sse_response(&reply.body).ok_or(BridgeError::Parse)?;
        let tools = data
            .get("result")
            .and_then(|result| result.get("tools"))
            .cloned()
            .ok_or(BridgeError::MissingTools)?;

        serde_json::from_value(tools).map_err(|_| BridgeError::MissingTools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> ToolCallOutcome {
        if !self.enabled {
            return ToolCallOutcome::failed(DISABLED_MESSAGE).with_hint(DISABLED_HINT);
        }

        if !self.monitor.is_running().await {
            return ToolCallOutcome::failed(NOT_RUNNING_MESSAGE).with_tool(name);
        }

        let session_id = match self.session.current().await {
            Some(session_id) => Some(session_id),
            None => self.initialize_session().await,
        };

        let audit_arguments = redact_value(&Value::Object(arguments.clone()));
        info!(tool = %name, arguments = %audit_arguments, "forwarding tool call");

        let request = rpc_request(
            self.next_request_id(),
            "tools/call",
            json!({
                "name": name,
                "arguments": arguments
            }),
        );

        match self
            .rpc
            .post(&request, session_id.as_deref(), self.timeouts.call)
            .await
        {
            Ok(reply) => interpret_call_reply(name, reply),
            Err(BridgeError::Timeout) => {
                warn!(tool = %name, "tool call timed out");
                ToolCallOutcome::failed(TIMED_OUT_MESSAGE)
            }
            Err(err) => {
                warn!(tool = %name, error = %err, "tool call failed");
                ToolCallOutcome::failed(format!("MCP call failed: {err}"))
            }
        }
    }
}

fn interpret_call_reply(tool: &str, reply: RpcReply) -> ToolCallOutcome {
    if reply.status != StatusCode::OK {
        let details = if reply.body.is_empty() {
            "No response body".to_string()
        } else {
            truncate_chars(&reply.body, ERROR_DETAIL_CHARS)
        };
        warn!(
            tool = %tool,
            status = reply.status.as_u16(),
            details = %details,
            "child rejected tool call"
        );
        return ToolCallOutcome::failed(format!("MCP server returned {}", reply.status.as_u16()))
            .with_details(details);
    }

    let Some(data) = parse_sse_response(&reply.body).filter(|data| !is_empty_reply(data)) else {
        return ToolCallOutcome::failed(UNPARSABLE_MESSAGE);
    };

    if let Some(error) = data.get("error") {
        return ToolCallOutcome::failed(error.clone());
    }

    let result = data.get("result");
    let payload = result
        .and_then(|result| result.get("content"))
        .or(result)
        .cloned()
        .unwrap_or(Value::Null);

    ToolCallOutcome::succeeded(tool, payload)
}

/// Null, `false`, zero and empty strings or containers carry nothing to
/// relay and count as an unparsable reply.
fn is_empty_reply(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
