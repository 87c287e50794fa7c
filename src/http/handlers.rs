//! Axum HTTP handlers for the sidecar facade
//!
//! Liveness and health probes, the tool bridge endpoints, and the legacy
//! `/execute` envelope.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bridge::ToolCallOutcome;
use crate::errors::AppError;
use crate::supervisor::SupervisorStatus;
use crate::AppState;

pub const CATALOG_SOURCE_HEADER: &str = "x-tool-catalog";

#[derive(Debug, Serialize)]
pub struct Features {
    pub notebooklm_mcp: bool,
    pub firestore_listener: bool,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub features: Features,
}

#[derive(Debug, Serialize)]
pub struct ChildHealth {
    pub enabled: bool,
    pub process_running: bool,
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub supervisor: SupervisorStatus,
}

#[derive(Debug, Serialize)]
pub struct TaskStoreHealth {
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub notebooklm_mcp: ChildHealth,
    pub firebase: TaskStoreHealth,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub action: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ExecuteResponse {
    Status {
        status: &'static str,
        message: String,
    },
    Tool(ToolCallOutcome),
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "running",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        features: Features {
            notebooklm_mcp: state.bridge.is_enabled(),
            firestore_listener: state.task_store_connected,
        },
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        notebooklm_mcp: ChildHealth {
            enabled: state.bridge.is_enabled(),
            process_running: state.bridge.child_running().await,
            session_id: state.bridge.session_preview().await,
            supervisor: state.supervisor.status().await,
        },
        firebase: TaskStoreHealth {
            connected: state.task_store_connected,
        },
    })
}

pub async fn list_tools(State(state): State<AppState>) -> Response {
    let catalog = state.bridge.list_tools().await;
    let mut response = Json(catalog.tools).into_response();
    response.headers_mut().insert(
        CATALOG_SOURCE_HEADER,
        HeaderValue::from_static(catalog.source.as_str()),
    );
    response
}

pub async fn call_tool(
    State(state): State<AppState>,
    payload: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Result<Json<ToolCallOutcome>, AppError> {
    let Json(request) = payload.map_err(invalid_body)?;
    Ok(Json(
        state
            .bridge
            .call_tool(&request.tool_name, request.arguments)
            .await,
    ))
}

pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, AppError> {
    let Json(request) = payload.map_err(invalid_body)?;

    let response = match request.action.as_str() {
        "test" => ExecuteResponse::Status {
            status: "success",
            message: "Sidecar is operational".to_string(),
        },
        "mcp_call" => {
            let tool_name = request
                .data
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let arguments = request
                .data
                .get("arguments")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            ExecuteResponse::Tool(state.bridge.call_tool(tool_name, arguments).await)
        }
        other => ExecuteResponse::Status {
            status: "error",
            message: format!("Unknown action: {other}"),
        },
    };

    Ok(Json(response))
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::bad_request("invalid_body", rejection.body_text())
}
