mod error;
mod interface;
mod manager;
mod process;
mod registry;
mod schema;
mod state;

pub use error::ToolInvokeError;
pub use interface::{ContentFragment, ToolConnection, ToolOutput};
pub use manager::{ConnectionManager, ConnectionSet, ServerConnector, StdioConnector};
pub use process::McpProcess;
pub use registry::{ToolRegistry, ToolRoute, render_function_spec};
pub use schema::{SchemaViolation, validate_arguments};
pub use state::{ConnectionState, StateCell};
