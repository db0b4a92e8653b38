use super::errors::ToolDispatchError;
use crate::application::tooling::{ToolOutput, ToolRegistry, validate_arguments};
use crate::types::{FunctionSpec, ToolCallRequest};
use serde_json::Value;
use tracing::{debug, warn};

/// Rendered result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub payload: String,
    /// `message_id` of a JSON-object payload, when present.
    pub message_id: Option<String>,
    pub is_error: bool,
}

/// Routes tool calls to the connection that owns the tool.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        self.registry.function_specs()
    }

    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<ToolCallResult, ToolDispatchError> {
        let route = self
            .registry
            .route(&call.name)
            .ok_or_else(|| ToolDispatchError::UnknownTool(call.name.clone()))?;

        validate_arguments(route.spec.input_schema.as_ref(), &call.arguments).map_err(
            |violation| ToolDispatchError::InvalidArguments {
                tool: call.name.clone(),
                violation,
            },
        )?;

        debug!(
            tool = call.name.as_str(),
            server = route.connection.server(),
            "Dispatching tool call"
        );
        let output = route
            .connection
            .call_tool(&call.name, call.arguments.clone())
            .await
            .map_err(|source| ToolDispatchError::Execution {
                tool: call.name.clone(),
                source,
            })?;

        let payload = render_payload(&output);
        if output.is_error {
            warn!(
                tool = call.name.as_str(),
                payload = payload.as_str(),
                "Tool reported an error"
            );
        }
        Ok(ToolCallResult {
            message_id: extract_message_id(&payload),
            payload,
            is_error: output.is_error,
        })
    }
}

/// Text fragments joined by newlines, or the JSON of all fragments when none
/// are text.
pub fn render_payload(output: &ToolOutput) -> String {
    let texts: Vec<&str> = output
        .content
        .iter()
        .filter_map(|fragment| fragment.as_text())
        .collect();
    if !texts.is_empty() {
        return texts.join("\n");
    }
    Value::Array(output.content.iter().map(|f| f.to_value()).collect()).to_string()
}

pub fn extract_message_id(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    match value.as_object()?.get("message_id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
