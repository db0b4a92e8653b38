use crate::application::tooling::{SchemaViolation, ToolInvokeError};
use crate::config::ConfigError;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

/// Anything that stops a run before the conversation can start.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ToolInvokeError),
}

impl SetupError {
    pub fn user_message(&self) -> String {
        match self {
            SetupError::Config(err) => err.user_message(),
            SetupError::Connection(ToolInvokeError::Spawn { server, .. }) => format!(
                "Tool server '{server}' could not be started. Check its command in the config."
            ),
            SetupError::Connection(ToolInvokeError::HandshakeTimeout { server, after }) => format!(
                "Tool server '{server}' did not respond within {}s.",
                after.as_secs()
            ),
            SetupError::Connection(err) => {
                format!("Tool server '{}' failed during setup: {err}", err.server())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolDispatchError {
    #[error("unknown tool requested: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for tool '{tool}': {violation}")]
    InvalidArguments {
        tool: String,
        violation: SchemaViolation,
    },
    #[error("failed to execute tool '{tool}': {source}")]
    Execution {
        tool: String,
        #[source]
        source: ToolInvokeError,
    },
}

impl ToolDispatchError {
    pub fn user_message(&self) -> String {
        match self {
            ToolDispatchError::UnknownTool(name) => {
                format!("The model asked for tool \"{name}\", which no server provides.")
            }
            ToolDispatchError::InvalidArguments { tool, violation } => {
                format!("The model sent invalid arguments to \"{tool}\" ({violation}).")
            }
            ToolDispatchError::Execution { tool, source } => {
                format!("Tool \"{tool}\" failed: {source}")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Dispatch(#[from] ToolDispatchError),
    #[error("no final answer after {limit} completion cycles")]
    IterationExhaustion { limit: usize },
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Setup(err) => err.user_message(),
            AgentError::Model(err) => err.user_message(),
            AgentError::Dispatch(err) => err.user_message(),
            AgentError::IterationExhaustion { limit } => format!(
                "The assistant could not finish within {limit} steps. Try a more specific instruction."
            ),
        }
    }
}

impl From<ConfigError> for AgentError {
    fn from(err: ConfigError) -> Self {
        AgentError::Setup(SetupError::Config(err))
    }
}

impl From<ToolInvokeError> for AgentError {
    fn from(err: ToolInvokeError) -> Self {
        AgentError::Setup(SetupError::Connection(err))
    }
}
