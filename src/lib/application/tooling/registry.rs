use super::error::ToolInvokeError;
use super::interface::ToolConnection;
use super::manager::ConnectionSet;
use crate::types::{FunctionSpec, ToolSpec};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Where a tool lives and what it accepts.
#[derive(Clone)]
pub struct ToolRoute {
    pub connection: Arc<dyn ToolConnection>,
    pub spec: ToolSpec,
}

impl std::fmt::Debug for ToolRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRoute")
            .field("server", &self.connection.server())
            .field("tool", &self.spec.name)
            .finish()
    }
}

/// Tool name to owning connection, built once per run.
///
/// When two servers expose the same tool name the server registered last
/// owns it.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    routes: HashMap<String, ToolRoute>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub async fn build(set: &ConnectionSet) -> Result<Self, ToolInvokeError> {
        let mut registry = Self::default();
        for connection in set.connections() {
            let tools = connection.list_tools().await?;
            debug!(
                server = connection.server(),
                tools = tools.len(),
                "Registering tools"
            );
            for spec in tools {
                registry.register(Arc::clone(connection), spec);
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, connection: Arc<dyn ToolConnection>, spec: ToolSpec) {
        let name = spec.name.clone();
        let route = ToolRoute { connection, spec };
        match self.routes.insert(name.clone(), route) {
            Some(previous) => debug!(
                tool = %name,
                previous = previous.connection.server(),
                "Tool name already registered; later server wins"
            ),
            None => self.order.push(name),
        }
    }

    pub fn route(&self, tool: &str) -> Option<&ToolRoute> {
        self.routes.get(tool)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// One function declaration per routed tool, in first-seen order.
    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        self.order
            .iter()
            .filter_map(|name| self.routes.get(name))
            .map(|route| render_function_spec(&route.spec))
            .collect()
    }
}

pub fn render_function_spec(spec: &ToolSpec) -> FunctionSpec {
    FunctionSpec {
        name: spec.name.clone(),
        description: spec.description.clone().unwrap_or_default(),
        parameters: spec
            .input_schema
            .clone()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
    }
}
