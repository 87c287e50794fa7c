//! Tool descriptors and the built-in catalog served when the child is away.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    Value::Object(Map::new())
}

impl ToolDescriptor {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Live,
    Fallback,
}

impl CatalogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalog {
    pub tools: Vec<ToolDescriptor>,
    pub source: CatalogSource,
}

impl ToolCatalog {
    pub fn live(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            source: CatalogSource::Live,
        }
    }

    pub fn fallback() -> Self {
        Self {
            tools: fallback_tools(),
            source: CatalogSource::Fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == CatalogSource::Fallback
    }
}

fn notebook_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "notebook_id": {"type": "string"}
        },
        "required": ["notebook_id"]
    })
}

/// Tools the notebook server is known to expose, in a fixed order.
pub fn fallback_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("healthcheck", "Check server health status", empty_schema()),
        ToolDescriptor::new(
            "chat_with_notebook",
            "Send a message to NotebookLM and get a grounded response",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The message to send"},
                    "notebook_id": {"type": "string", "description": "Optional notebook ID"}
                },
                "required": ["message"]
            }),
        ),
        ToolDescriptor::new(
            "send_chat_message",
            "Send a chat message without waiting for response",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                    "wait_for_response": {"type": "boolean", "default": false}
                },
                "required": ["message"]
            }),
        ),
        ToolDescriptor::new(
            "get_chat_response",
            "Get the response from NotebookLM",
            json!({
                "type": "object",
                "properties": {
                    "timeout": {"type": "integer", "default": 30}
                }
            }),
        ),
        ToolDescriptor::new(
            "navigate_to_notebook",
            "Navigate to a specific notebook",
            notebook_id_schema(),
        ),
        ToolDescriptor::new(
            "get_default_notebook",
            "Get the currently active notebook",
            empty_schema(),
        ),
        ToolDescriptor::new(
            "set_default_notebook",
            "Set the default notebook",
            notebook_id_schema(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fallback_catalog_has_fixed_order() {
        let names: Vec<String> = fallback_tools().into_iter().map(|tool| tool.name).collect();
        assert_eq!(
            names,
            vec![
                "healthcheck",
                "chat_with_notebook",
                "send_chat_message",
                "get_chat_response",
                "navigate_to_notebook",
                "get_default_notebook",
                "set_default_notebook",
            ]
        );
        assert!(ToolCatalog::fallback().is_degraded());
    }

    #[test]
    fn descriptor_uses_camel_case_schema_key() {
        let tool = &fallback_tools()[1];
        let value = serde_json::to_value(tool).expect("serialize descriptor");
        assert_eq!(value["inputSchema"]["required"], json!(["message"]));
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn descriptor_defaults_missing_fields() {
        let tool: ToolDescriptor =
            serde_json::from_value(json!({"name": "echo"})).expect("deserialize descriptor");
        assert_eq!(tool.description, "");
        assert_eq!(tool.input_schema, json!({}));
    }
}
