//! Model traits

use super::types::{CompletionRequest, ModelError, ModelTurn};
use async_trait::async_trait;

/// Anything that can answer a completion request with a normalized turn.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Identifier used in logs and error messages
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<ModelTurn, ModelError>;
}
