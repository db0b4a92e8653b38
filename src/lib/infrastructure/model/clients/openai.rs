//! OpenAI client speaking either the Responses or the Chat Completions shape

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::config::ProviderSettings;
use crate::infrastructure::model::adapter::ProtocolShape;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{CompletionRequest, ModelError, ModelTurn};

pub const PROVIDER_ID: &str = "openai";

/// OpenAI client. The protocol shape is chosen once, when the client is built.
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
    model: String,
    shape: ProtocolShape,
}

impl OpenAIClient {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(
            HttpClientBase::new(
                PROVIDER_ID.to_string(),
                settings.endpoint().to_string(),
                Some(settings.api_key.clone()),
            ),
            settings.model.clone(),
            ProtocolShape::for_settings(settings),
        )
    }

    pub fn new(base: HttpClientBase, model: impl Into<String>, shape: ProtocolShape) -> Self {
        Self {
            base,
            model: model.into(),
            shape,
        }
    }

    pub fn shape(&self) -> ProtocolShape {
        self.shape
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelProvider for OpenAIClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurn, ModelError> {
        let url = self.base.build_url(self.shape.path());
        let payload = self.shape.encode_request(&self.model, &request);

        info!(
            provider = self.base.id.as_str(),
            model = self.model.as_str(),
            shape = self.shape.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response: Value = self.base.post_with_bearer(&url, &payload).await?;
        let turn = self.shape.decode_response(&self.base.id, &response)?;
        debug!(
            provider = self.base.id.as_str(),
            tool_calls = match &turn {
                ModelTurn::ToolCalls(calls) => calls.len(),
                ModelTurn::FinalText(_) => 0,
            },
            "Received completion response"
        );
        Ok(turn)
    }
}
