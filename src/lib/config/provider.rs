//! # Provider Settings
//!
//! Completion provider settings are read from the process environment rather
//! than the config file, so credentials never land in a checked-in TOML.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `OPENAI_API_KEY` | Bearer credential (`OPENAI_KEY` accepted as fallback) | required |
//! | `OPENAI_MODEL` | Model name | `gpt-5.2` |
//! | `OPENAI_BASE_URL` | Alternate OpenAI-compatible endpoint | unset |

use super::error::ConfigError;
use crate::constants::{DEFAULT_MODEL, DEFAULT_OPENAI_ENDPOINT};
use std::env;
use std::fmt;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const API_KEY_FALLBACK_VAR: &str = "OPENAI_KEY";
pub const MODEL_VAR: &str = "OPENAI_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

/// Credential, model and endpoint for the completion provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    /// Alternate endpoint. Its presence switches the run to the
    /// chat-completions protocol shape.
    pub base_url: Option<String>,
}

impl ProviderSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty(API_KEY_VAR)
            .or_else(|| non_empty(API_KEY_FALLBACK_VAR))
            .ok_or(ConfigError::MissingApiKey)?;
        let model = non_empty(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = non_empty(BASE_URL_VAR);

        Ok(Self {
            api_key,
            model,
            base_url,
        })
    }

    pub fn uses_alternate_endpoint(&self) -> bool {
        self.base_url.is_some()
    }

    /// Endpoint the HTTP client should talk to.
    pub fn endpoint(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_ENDPOINT)
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
