use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::ToolInvokeError;
use super::state::ConnectionState;
use crate::types::ToolSpec;

/// One piece of a `tools/call` result.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentFragment {
    Text(String),
    Other(Value),
}

impl ContentFragment {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentFragment::Text(text) => Some(text),
            ContentFragment::Other(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ContentFragment::Text(text) => serde_json::json!({ "type": "text", "text": text }),
            ContentFragment::Other(value) => value.clone(),
        }
    }
}

impl From<Value> for ContentFragment {
    fn from(value: Value) -> Self {
        let is_text = value
            .get("type")
            .and_then(Value::as_str)
            .map(|kind| kind.eq_ignore_ascii_case("text"))
            .unwrap_or(false);
        match value.get("text").and_then(Value::as_str) {
            Some(text) if is_text => ContentFragment::Text(text.to_string()),
            _ => ContentFragment::Other(value),
        }
    }
}

/// Decoded `tools/call` result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    pub content: Vec<ContentFragment>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentFragment::Text(text.into())],
            is_error: false,
        }
    }

    pub fn from_result(result: &Value) -> Self {
        let content = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| items.iter().cloned().map(ContentFragment::from).collect())
            .unwrap_or_default();
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self { content, is_error }
    }
}

/// A live connection to one tool server.
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Name of the server descriptor this connection was opened for.
    fn server(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Tool specs captured when the connection became ready.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolInvokeError>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolInvokeError>;

    /// Shut the connection down. Calling this more than once is a no-op.
    async fn close(&self);
}
