use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod bridge;
pub mod config;
pub mod echo;
pub mod errors;
pub mod http;
pub mod logging;
pub mod session;
pub mod sse;
pub mod supervisor;

use bridge::ToolBridge;
use supervisor::Supervisor;

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<ToolBridge>,
    pub supervisor: Arc<Supervisor>,
    pub task_store_connected: bool,
}

impl AppState {
    pub fn new(
        bridge: Arc<ToolBridge>,
        supervisor: Arc<Supervisor>,
        task_store_connected: bool,
    ) -> Self {
        Self {
            bridge,
            supervisor,
            task_store_connected,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::handlers::root))
        .route("/health", get(http::handlers::health))
        .route("/mcp/list", get(http::handlers::list_tools))
        .route("/mcp/call", post(http::handlers::call_tool))
        .route("/execute", post(http::handlers::execute))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::bridge::{rpc::RpcClient, DISABLED_HINT, DISABLED_MESSAGE, NOT_RUNNING_MESSAGE};
    use crate::echo::build_echo_app;
    use crate::http::handlers::CATALOG_SOURCE_HEADER;
    use crate::supervisor::{ChildMonitor, ChildSettings, CHILD_PORT};

    use super::*;

    struct StubMonitor(bool);

    #[async_trait::async_trait]
    impl ChildMonitor for StubMonitor {
        async fn is_running(&self) -> bool {
            self.0
        }
    }

    fn idle_supervisor() -> Arc<Supervisor> {
        Arc::new(Supervisor::new(ChildSettings::from_command_line(
            "echo-child",
            std::path::PathBuf::from("unused-config.json"),
            CHILD_PORT,
            String::new(),
        )))
    }

    fn app_with(endpoint: &str, running: bool, enabled: bool) -> (Router, Arc<ToolBridge>) {
        let bridge = Arc::new(ToolBridge::new(
            RpcClient::new(endpoint),
            Arc::new(StubMonitor(running)),
            enabled,
        ));
        let state = AppState::new(bridge.clone(), idle_supervisor(), false);
        (build_app(state), bridge)
    }

    fn app(enabled: bool) -> Router {
        app_with("http://127.0.0.1:9/mcp", false, enabled).0
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("request build")
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    async fn body_json(response: Response) -> Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    #[tokio::test]
    async fn root_reports_features() {
        let response = app(true)
            .oneshot(get_request("/"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["service"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["features"]["notebooklm_mcp"], true);
        assert_eq!(body["features"]["firestore_listener"], false);
    }

    #[tokio::test]
    async fn health_without_child() {
        let response = app(false)
            .oneshot(get_request("/health"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "status": "healthy",
                "notebooklm_mcp": {
                    "enabled": false,
                    "process_running": false,
                    "session_id": null,
                    "state": "stopped",
                    "pid": null,
                    "started_at_utc": null
                },
                "firebase": {"connected": false}
            })
        );
    }

    #[tokio::test]
    async fn health_reports_truncated_session() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind echo child");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, build_echo_app().into_make_service())
                .await
                .expect("serve echo child");
        });

        let (app, bridge) = app_with(&format!("http://{addr}/mcp"), true, true);
        let session_id = bridge.initialize_session().await.expect("session");

        let response = app
            .oneshot(get_request("/health"))
            .await
            .expect("request execution");
        let body = body_json(response).await;

        assert_eq!(body["notebooklm_mcp"]["process_running"], true);
        assert_eq!(
            body["notebooklm_mcp"]["session_id"],
            json!(format!("{}...", &session_id[..16]))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn health_reports_supervised_child() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let supervisor = Arc::new(Supervisor::new(ChildSettings {
            program: "sh".to_string(),
            leading_args: vec!["-c".to_string(), "exec sleep 30".to_string(), "child".to_string()],
            config_path: dir.path().join("notebooklm-config.json"),
            port: CHILD_PORT,
            default_notebook_id: "nb-1".to_string(),
        }));
        let bridge = Arc::new(ToolBridge::new(
            RpcClient::new("http://127.0.0.1:9/mcp"),
            supervisor.clone(),
            true,
        ));
        let app = build_app(AppState::new(bridge, supervisor.clone(), false));

        let pid = supervisor.start().await.expect("start child");
        let response = app
            .oneshot(get_request("/health"))
            .await
            .expect("request execution");
        let body = body_json(response).await;
        supervisor.stop().await.expect("stop child");

        let child = &body["notebooklm_mcp"];
        assert_eq!(child["process_running"], true);
        assert_eq!(child["state"], "running");
        assert_eq!(child["pid"], json!(pid));
        assert!(child["started_at_utc"].is_string());
    }

    #[tokio::test]
    async fn tool_list_falls_back_when_child_is_down() {
        let response = app(true)
            .oneshot(get_request("/mcp/list"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CATALOG_SOURCE_HEADER], "fallback");
        let body = body_json(response).await;
        let tools = body.as_array().expect("tool array");
        assert_eq!(tools.len(), 7);
        assert_eq!(tools[0]["name"], "healthcheck");
        assert_eq!(tools[1]["inputSchema"]["required"], json!(["message"]));
    }

    #[tokio::test]
    async fn tool_call_when_disabled_returns_hint() {
        let response = app(false)
            .oneshot(post_json(
                "/mcp/call",
                r#"{"tool_name":"chat_with_notebook","arguments":{"message":"hi"}}"#,
            ))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": DISABLED_MESSAGE, "hint": DISABLED_HINT})
        );
    }

    #[tokio::test]
    async fn tool_call_when_enabled_but_down_names_tool() {
        let response = app(true)
            .oneshot(post_json("/mcp/call", r#"{"tool_name":"healthcheck"}"#))
            .await
            .expect("request execution");

        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": NOT_RUNNING_MESSAGE, "tool": "healthcheck"})
        );
    }

    #[tokio::test]
    async fn tool_call_rejects_malformed_body() {
        let response = app(true)
            .oneshot(post_json("/mcp/call", r#"{"arguments":{}}"#))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "invalid_body");
    }

    #[tokio::test]
    async fn execute_test_action() {
        let response = app(false)
            .oneshot(post_json("/execute", r#"{"action":"test"}"#))
            .await
            .expect("request execution");

        assert_eq!(
            body_json(response).await,
            json!({"status": "success", "message": "Sidecar is operational"})
        );
    }

    #[tokio::test]
    async fn execute_unknown_action() {
        let response = app(false)
            .oneshot(post_json("/execute", r#"{"action":"dance","data":{}}"#))
            .await
            .expect("request execution");

        assert_eq!(
            body_json(response).await,
            json!({"status": "error", "message": "Unknown action: dance"})
        );
    }

    #[tokio::test]
    async fn execute_mcp_call_routes_to_bridge() {
        let response = app(false)
            .oneshot(post_json(
                "/execute",
                r#"{"action":"mcp_call","data":{"tool_name":"healthcheck","arguments":{}}}"#,
            ))
            .await
            .expect("request execution");

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["hint"], DISABLED_HINT);
    }

    #[tokio::test]
    async fn execute_mcp_call_reaches_live_child() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind echo child");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, build_echo_app().into_make_service())
                .await
                .expect("serve echo child");
        });

        let (app, _bridge) = app_with(&format!("http://{addr}/mcp"), true, true);
        let response = app
            .oneshot(post_json(
                "/execute",
                r#"{"action":"mcp_call","data":{"tool_name":"echo","arguments":{"message":"yo"}}}"#,
            ))
            .await
            .expect("request execution");

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["tool"], "echo");
        assert_eq!(body["result"][0]["text"], "Echo: yo");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app(true)
            .oneshot(get_request("/mcp"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
