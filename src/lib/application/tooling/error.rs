use super::state::ConnectionState;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool server '{server}' did not complete the handshake within {after:?}")]
    HandshakeTimeout { server: String, after: Duration },
    #[error("tool server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("tool server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("tool server '{server}' did not answer '{tool}' within {after:?}")]
    CallTimeout {
        server: String,
        tool: String,
        after: Duration,
    },
    #[error("tool server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("tool server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("tool server '{server}' cannot move from {from} to {to}")]
    InvalidTransition {
        server: String,
        from: ConnectionState,
        to: ConnectionState,
    },
    #[error("tool server '{server}' is {state}, not ready")]
    NotReady {
        server: String,
        state: ConnectionState,
    },
}

impl ToolInvokeError {
    pub fn server(&self) -> &str {
        match self {
            ToolInvokeError::Spawn { server, .. }
            | ToolInvokeError::HandshakeTimeout { server, .. }
            | ToolInvokeError::Transport { server, .. }
            | ToolInvokeError::InvalidJson { server, .. }
            | ToolInvokeError::Rpc { server, .. }
            | ToolInvokeError::CallTimeout { server, .. }
            | ToolInvokeError::Terminated { server }
            | ToolInvokeError::Cancelled { server }
            | ToolInvokeError::InvalidTransition { server, .. }
            | ToolInvokeError::NotReady { server, .. } => server,
        }
    }
}
