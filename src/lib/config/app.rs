use super::error::ConfigError;
use super::server::ServerConfig;
use std::path::Path;
use std::time::Duration;

/// Application configuration loaded from agent.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub servers: Vec<ServerConfig>,
    pub handshake_timeout: Duration,
    pub system_prompt: Option<String>,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }
}
