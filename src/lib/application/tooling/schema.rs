//! Minimal JSON-schema check for outgoing tool arguments.
//!
//! Supports `type`, `properties`, `required`, `additionalProperties: false`,
//! `enum` and array `items`. Unknown keywords are ignored.

use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Checks `arguments` against an object schema. A missing schema accepts
/// anything.
pub fn validate_arguments(
    schema: Option<&Value>,
    arguments: &Map<String, Value>,
) -> Result<(), SchemaViolation> {
    match schema {
        Some(schema) => validate_object(schema, arguments, "$"),
        None => Ok(()),
    }
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let Some(rules) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = rules.get("type") {
        if !type_matches(expected, value) {
            return Err(violation(
                path,
                format!("expected {}, got {}", describe_type(expected), kind_of(value)),
            ));
        }
    }

    if let Some(allowed) = rules.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(violation(path, format!("{value} is not one of the allowed values")));
        }
    }

    match value {
        Value::Object(map) => validate_object(schema, map, path),
        Value::Array(items) => match rules.get("items") {
            Some(item_schema) => {
                for (index, item) in items.iter().enumerate() {
                    validate_value(item_schema, item, &format!("{path}[{index}]"))?;
                }
                Ok(())
            }
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn validate_object(
    schema: &Value,
    map: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                return Err(violation(path, format!("missing required property '{key}'")));
            }
        }
    }

    let closed = matches!(schema.get("additionalProperties"), Some(Value::Bool(false)));
    for (key, value) in map {
        match properties.and_then(|props| props.get(key)) {
            Some(property) => validate_value(property, value, &format!("{path}.{key}"))?,
            None if closed => {
                return Err(violation(path, format!("unexpected property '{key}'")));
            }
            None => {}
        }
    }
    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => single_type_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| single_type_matches(name, value)),
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn violation(path: &str, message: String) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn order_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": { "type": "string" },
                "priority": { "type": "string", "enum": ["low", "high"] },
                "quantity": { "type": "integer" },
                "tags": { "type": "array", "items": { "type": "string" } },
                "address": {
                    "type": "object",
                    "properties": { "zip": { "type": "string" } },
                    "required": ["zip"]
                }
            },
            "required": ["order_id"],
            "additionalProperties": false
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let schema = order_schema();
        let result = validate_arguments(
            Some(&schema),
            &args(json!({
                "order_id": "ORD-1001",
                "priority": "high",
                "quantity": 2,
                "tags": ["gift"],
                "address": { "zip": "10115" }
            })),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_missing_required_property() {
        let schema = order_schema();
        let err = validate_arguments(Some(&schema), &args(json!({ "priority": "low" }))).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("order_id"));
    }

    #[test]
    fn rejects_wrong_types() {
        let schema = order_schema();
        let err =
            validate_arguments(Some(&schema), &args(json!({ "order_id": 1001 }))).unwrap_err();
        assert_eq!(err.path, "$.order_id");
        assert_eq!(err.message, "expected string, got number");

        let err = validate_arguments(
            Some(&schema),
            &args(json!({ "order_id": "ORD-1", "quantity": 1.5 })),
        )
        .unwrap_err();
        assert_eq!(err.path, "$.quantity");
    }

    #[test]
    fn rejects_unexpected_properties_enum_and_nested_failures() {
        let schema = order_schema();
        assert!(
            validate_arguments(Some(&schema), &args(json!({ "order_id": "x", "extra": true })))
                .is_err()
        );
        assert!(
            validate_arguments(Some(&schema), &args(json!({ "order_id": "x", "priority": "urgent" })))
                .is_err()
        );
        let err = validate_arguments(
            Some(&schema),
            &args(json!({ "order_id": "x", "tags": ["ok", 3] })),
        )
        .unwrap_err();
        assert_eq!(err.path, "$.tags[1]");
        let err = validate_arguments(
            Some(&schema),
            &args(json!({ "order_id": "x", "address": {} })),
        )
        .unwrap_err();
        assert_eq!(err.path, "$.address");
    }

    #[test]
    fn missing_schema_accepts_anything() {
        assert!(validate_arguments(None, &args(json!({ "anything": [1, 2] }))).is_ok());
    }
}
