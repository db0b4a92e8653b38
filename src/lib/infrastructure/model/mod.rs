//! Model infrastructure module
//!
//! Talks to the completion provider and hides which wire shape it speaks.
//!
//! # Structure
//! - `types` - Request, Turn, Error types
//! - `traits` - ModelProvider trait
//! - `adapter` - Responses / Chat Completions wire shapes
//! - `factory` - Provider factory for creating clients
//! - `clients` - HTTP client implementation

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use adapter::ProtocolShape;
pub use factory::ProviderFactory;
pub use traits::ModelProvider;
pub use types::{CompletionRequest, ModelError, ModelTurn};
