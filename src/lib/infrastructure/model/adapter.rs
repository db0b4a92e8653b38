//! Protocol adapters - convert between the provider-neutral conversation and
//! the two OpenAI wire shapes.
//!
//! * [`ProtocolShape::Responses`]: `POST /responses` with `input` items and
//!   flat function tools.
//! * [`ProtocolShape::ChatCompletions`]: `POST /chat/completions` with
//!   `messages` and nested function tools.

use super::types::{CompletionRequest, ModelError, ModelTurn};
use crate::config::ProviderSettings;
use crate::types::{ChatMessage, FunctionSpec, MessageRole, ToolCallRequest};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolShape {
    Responses,
    ChatCompletions,
}

impl ProtocolShape {
    /// An alternate endpoint means an OpenAI-compatible server, which only
    /// speaks chat completions.
    pub fn for_settings(settings: &ProviderSettings) -> Self {
        if settings.uses_alternate_endpoint() {
            Self::ChatCompletions
        } else {
            Self::Responses
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Responses => "responses",
            Self::ChatCompletions => "chat_completions",
        }
    }

    /// Path appended to the provider endpoint.
    pub fn path(self) -> &'static str {
        match self {
            Self::Responses => "responses",
            Self::ChatCompletions => "chat/completions",
        }
    }

    pub fn encode_request(self, model: &str, request: &CompletionRequest) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), Value::String(model.to_string()));
        match self {
            Self::Responses => {
                let input = request.messages.iter().flat_map(responses_items).collect();
                body.insert("input".into(), Value::Array(input));
                if !request.tools.is_empty() {
                    let tools = request.tools.iter().map(responses_tool).collect();
                    body.insert("tools".into(), Value::Array(tools));
                }
            }
            Self::ChatCompletions => {
                let messages = request.messages.iter().map(chat_message).collect();
                body.insert("messages".into(), Value::Array(messages));
                if !request.tools.is_empty() {
                    let tools = request.tools.iter().map(chat_tool).collect();
                    body.insert("tools".into(), Value::Array(tools));
                }
            }
        }
        Value::Object(body)
    }

    pub fn decode_response(self, provider: &str, body: &Value) -> Result<ModelTurn, ModelError> {
        match self {
            Self::Responses => decode_responses(provider, body),
            Self::ChatCompletions => decode_chat(provider, body),
        }
    }
}

fn responses_items(message: &ChatMessage) -> Vec<Value> {
    match message.role {
        MessageRole::System | MessageRole::User => vec![json!({
            "role": message.role.as_str(),
            "content": message.content,
        })],
        MessageRole::Assistant => {
            let mut items = Vec::with_capacity(message.tool_calls.len() + 1);
            if !message.content.is_empty() || message.tool_calls.is_empty() {
                items.push(json!({ "role": "assistant", "content": message.content }));
            }
            items.extend(message.tool_calls.iter().map(|call| {
                json!({
                    "type": "function_call",
                    "call_id": call.id,
                    "name": call.name,
                    "arguments": arguments_string(call),
                })
            }));
            items
        }
        MessageRole::Tool => vec![json!({
            "type": "function_call_output",
            "call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "output": message.content,
        })],
    }
}

fn responses_tool(spec: &FunctionSpec) -> Value {
    json!({
        "type": "function",
        "name": spec.name,
        "description": spec.description,
        "parameters": spec.parameters,
    })
}

fn chat_message(message: &ChatMessage) -> Value {
    match message.role {
        MessageRole::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": arguments_string(call),
                        }
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "name": message.name.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

fn chat_tool(spec: &FunctionSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        }
    })
}

fn arguments_string(call: &ToolCallRequest) -> String {
    Value::Object(call.arguments.clone()).to_string()
}

fn decode_responses(provider: &str, body: &Value) -> Result<ModelTurn, ModelError> {
    let top_level_text = body.get("output_text").and_then(Value::as_str);
    let output: &[Value] = match body.get("output") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(ModelError::protocol(provider, "'output' is not an array")),
        None if top_level_text.is_some() => &[],
        None => return Err(ModelError::protocol(provider, "missing 'output'")),
    };

    let mut calls = Vec::new();
    let mut texts = Vec::new();
    for item in output {
        match item.get("type").and_then(Value::as_str) {
            Some("function_call") | Some("tool_call") => {
                // Some gateways nest name and arguments under `function`.
                let source = item.get("function").unwrap_or(item);
                let id = required_str(provider, item, "call_id")
                    .or_else(|_| required_str(provider, item, "id"))?;
                let name = required_str(provider, source, "name")?;
                let arguments = parse_arguments(provider, name, source.get("arguments"))?;
                calls.push(ToolCallRequest::new(id, name, arguments));
            }
            Some("message") => {
                let parts = item
                    .get("content")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                texts.extend(
                    parts
                        .iter()
                        .filter(|part| {
                            matches!(
                                part.get("type").and_then(Value::as_str),
                                Some("output_text") | Some("text")
                            )
                        })
                        .filter_map(|part| part.get("text").and_then(Value::as_str)),
                );
            }
            _ => {}
        }
    }

    if !calls.is_empty() {
        return Ok(ModelTurn::ToolCalls(calls));
    }
    let text = match top_level_text {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => texts.concat(),
    };
    Ok(ModelTurn::FinalText(text))
}

fn decode_chat(provider: &str, body: &Value) -> Result<ModelTurn, ModelError> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| ModelError::protocol(provider, "missing 'choices'"))?;
    let message = choices
        .first()
        .and_then(|choice| choice.get("message"))
        .filter(|message| message.is_object())
        .ok_or_else(|| ModelError::protocol(provider, "missing 'choices[0].message'"))?;

    let raw_calls: &[Value] = match message.get("tool_calls") {
        Some(Value::Array(calls)) => calls.as_slice(),
        Some(Value::Null) | None => &[],
        Some(_) => return Err(ModelError::protocol(provider, "'tool_calls' is not an array")),
    };

    if !raw_calls.is_empty() {
        let calls = raw_calls
            .iter()
            .map(|call| {
                let id = required_str(provider, call, "id")?;
                let function = call
                    .get("function")
                    .ok_or_else(|| ModelError::protocol(provider, "tool call without 'function'"))?;
                let name = required_str(provider, function, "name")?;
                let arguments = parse_arguments(provider, name, function.get("arguments"))?;
                Ok(ToolCallRequest::new(id, name, arguments))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;
        return Ok(ModelTurn::ToolCalls(calls));
    }

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(ModelTurn::FinalText(text))
}

fn required_str<'a>(provider: &str, value: &'a Value, field: &str) -> Result<&'a str, ModelError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ModelError::protocol(provider, format!("tool call missing '{field}'")))
}

/// Arguments arrive as a JSON-encoded string; some compatible servers send
/// the object inline instead.
fn parse_arguments(
    provider: &str,
    tool: &str,
    raw: Option<&Value>,
) -> Result<Map<String, Value>, ModelError> {
    let parsed = match raw {
        None | Some(Value::Null) => return Ok(Map::new()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(Map::new()),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text).map_err(|err| {
            ModelError::protocol(provider, format!("arguments for '{tool}' are not JSON: {err}"))
        })?,
        Some(other) => other.clone(),
    };
    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(ModelError::protocol(
            provider,
            format!("arguments for '{tool}' are not a JSON object"),
        )),
    }
}
