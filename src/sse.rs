//! Decoding of child replies that may arrive SSE framed.
//!
//! Streamable HTTP servers answer either with a bare JSON document or with an
//! event stream such as `event: message\ndata: {...}\n\n`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

const LOGGED_BODY_CHARS: usize = 200;

fn sse_data_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)data:\s*(\{.*\})").expect("valid SSE data pattern"))
}

/// Extracts the JSON object following `data:`, or parses the whole body when
/// it is not framed. Returns `None` for anything that is not valid JSON.
pub fn parse_sse_response(text: &str) -> Option<Value> {
    let candidate = sse_data_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map_or(text, |data| data.as_str());

    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                error = %err,
                body = %truncate_chars(text, LOGGED_BODY_CHARS),
                "failed to parse child response"
            );
            None
        }
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
