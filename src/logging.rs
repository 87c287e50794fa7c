use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request summary"
    );

    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), "request failed");
    }

    response
}

/// Copy of `value` with credential-like object keys replaced by `[REDACTED]`.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "cookie"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::redact_value;

    #[test]
    fn redacts_sensitive_fields_in_tool_arguments() {
        let arguments = json!({
            "message": "summarize the launch plan",
            "api_key": "should-not-appear",
            "nested": {
                "refresh_token": "should-not-appear",
                "notebook_id": "nb-1"
            },
            "history": [{ "password": "should-not-appear" }]
        });

        let redacted = redact_value(&arguments);

        assert_eq!(redacted["message"], json!("summarize the launch plan"));
        assert_eq!(redacted["api_key"], json!("[REDACTED]"));
        assert_eq!(redacted["nested"]["refresh_token"], json!("[REDACTED]"));
        assert_eq!(redacted["nested"]["notebook_id"], json!("nb-1"));
        assert_eq!(redacted["history"][0]["password"], json!("[REDACTED]"));
    }
}
