//! Provider factory - creates the completion client from settings

use super::clients::OpenAIClient;
use super::traits::ModelProvider;
use crate::config::ProviderSettings;
use std::sync::Arc;
use tracing::debug;

/// Factory for creating the model client from provider settings.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Creates the OpenAI client for `settings`.
    ///
    /// - `OPENAI_BASE_URL` set → chat completions against that endpoint
    /// - otherwise → responses against the public API
    pub fn create(settings: &ProviderSettings) -> Arc<dyn ModelProvider> {
        let client = OpenAIClient::from_settings(settings);
        debug!(
            endpoint = settings.endpoint(),
            model = client.model(),
            shape = client.shape().as_str(),
            "Created completion client"
        );
        Arc::new(client)
    }
}
