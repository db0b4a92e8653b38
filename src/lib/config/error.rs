use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no tool servers configured - at least one [[servers]] entry is required")]
    NoServersConfigured,

    #[error("tool server entry is missing a name")]
    EmptyServerName,

    #[error("tool server '{name}' is configured more than once")]
    DuplicateServer { name: String },

    #[error("handshake timeout must be greater than zero")]
    InvalidHandshakeTimeout,

    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::MissingApiKey => "OPENAI_API_KEY is not set. Export it before running, \
                 or put OPENAI_API_KEY=... in a .env file in the working directory."
                .to_string(),
            ConfigError::NotFound { path } => format!(
                "Configuration file {} was not found. Pass --config to point at a file with [[servers]] entries.",
                path.display()
            ),
            other => other.to_string(),
        }
    }
}
