use super::error::ToolInvokeError;
use super::interface::ToolConnection;
use super::process::McpProcess;
use crate::config::ServerConfig;
use crate::constants::HANDSHAKE_TIMEOUT;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens a single ready connection to one configured server.
#[async_trait]
pub trait ServerConnector: Send + Sync {
    async fn connect(
        &self,
        server: &ServerConfig,
        handshake_timeout: Duration,
    ) -> Result<Arc<dyn ToolConnection>, ToolInvokeError>;
}

/// Launches each server as a child process speaking JSON-RPC over stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

#[async_trait]
impl ServerConnector for StdioConnector {
    async fn connect(
        &self,
        server: &ServerConfig,
        handshake_timeout: Duration,
    ) -> Result<Arc<dyn ToolConnection>, ToolInvokeError> {
        let process = McpProcess::connect(server.clone(), handshake_timeout).await?;
        Ok(Arc::new(process))
    }
}

/// Opens one connection per configured server for the duration of a run.
#[derive(Clone)]
pub struct ConnectionManager {
    handshake_timeout: Duration,
    connector: Arc<dyn ServerConnector>,
}

impl ConnectionManager {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self {
            handshake_timeout,
            connector: Arc::new(StdioConnector),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn ServerConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Connects to every server in order.
    ///
    /// If any server fails, everything opened so far is closed in reverse
    /// order before the error is returned.
    pub async fn connect_all(
        &self,
        servers: &[ServerConfig],
    ) -> Result<ConnectionSet, ToolInvokeError> {
        let mut set = ConnectionSet::default();
        for server in servers {
            debug!(server = %server.name, "Connecting to tool server");
            match self.connector.connect(server, self.handshake_timeout).await {
                Ok(connection) => set.push(connection),
                Err(err) => {
                    warn!(server = %server.name, %err, "Tool server setup failed");
                    set.close_all().await;
                    return Err(err);
                }
            }
        }
        info!(count = set.len(), "All tool servers connected");
        Ok(set)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(HANDSHAKE_TIMEOUT)
    }
}

/// Connections opened for one run, kept in creation order.
#[derive(Default)]
pub struct ConnectionSet {
    connections: Vec<Arc<dyn ToolConnection>>,
}

impl ConnectionSet {
    pub fn from_connections(connections: Vec<Arc<dyn ToolConnection>>) -> Self {
        Self { connections }
    }

    pub fn push(&mut self, connection: Arc<dyn ToolConnection>) {
        self.connections.push(connection);
    }

    pub fn connections(&self) -> &[Arc<dyn ToolConnection>] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes every connection, newest first.
    pub async fn close_all(&self) {
        for connection in self.connections.iter().rev() {
            connection.close().await;
        }
    }
}

impl std::fmt::Debug for ConnectionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.connections.iter().map(|conn| conn.server()))
            .finish()
    }
}
