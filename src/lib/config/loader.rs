use super::CONFIG_PATH;
use super::error::ConfigError;
use super::server::{RawServer, ServerConfig};
use crate::constants::{ENV_PATH, HANDSHAKE_TIMEOUT};
use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub agent: RawAgentSection,
    #[serde(default)]
    pub servers: Vec<RawServer>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawAgentSection {
    pub handshake_timeout_secs: Option<u64>,
    pub system_prompt: Option<String>,
}

/// Loads `.env` from the working directory once. Variables that are already
/// set in the process environment keep their value.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| match from_filename(ENV_PATH) {
        Ok(path) => debug!(path = %path.display(), "Loaded environment file"),
        Err(err) => debug!(%err, "No environment file loaded"),
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<super::AppConfig, ConfigError> {
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    read_config(config_path)
}

/// Parse configuration from an in-memory TOML document
pub fn parse_config(content: &str, origin: &Path) -> Result<super::AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn read_config(path: &Path) -> Result<super::AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content, path)
}

fn validate_and_build(parsed: RawConfig) -> Result<super::AppConfig, ConfigError> {
    if parsed.servers.is_empty() {
        return Err(ConfigError::NoServersConfigured);
    }

    let mut seen = HashSet::new();
    for raw in &parsed.servers {
        let name = raw.name().trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyServerName);
        }
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::DuplicateServer {
                name: name.to_string(),
            });
        }
    }

    let handshake_timeout = match parsed.agent.handshake_timeout_secs {
        Some(0) => return Err(ConfigError::InvalidHandshakeTimeout),
        Some(secs) => Duration::from_secs(secs),
        None => HANDSHAKE_TIMEOUT,
    };

    let system_prompt = parsed
        .agent
        .system_prompt
        .filter(|prompt| !prompt.trim().is_empty());

    Ok(super::AppConfig {
        servers: parsed.servers.into_iter().map(ServerConfig::from).collect(),
        handshake_timeout,
        system_prompt,
    })
}
