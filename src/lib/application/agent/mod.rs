//! # Agent Module
//!
//! Drives one instruction from guard to terminal outcome over a set of tool
//! server connections.
//!
//! ## Key Types
//!
//! - [`Agent`] - The run executor
//! - [`AgentOptions`] - System prompt, cycle limit and terminal tool prefix
//! - [`RunOutcome`] - Answer, confirmation or refusal
//! - [`ToolDispatcher`] - Routes model tool calls to their server
//! - [`AgentError`] - Errors that end a run
//!
//! ## Agent Loop
//!
//! 1. Build the tool registry from every connection
//! 2. Ask the policy guard; BLOCK and CLARIFY end the run here
//! 3. Send the conversation and tool list to the model
//! 4. Final text ends the run; tool calls are dispatched in order
//! 5. A `send*` tool ends the run with a confirmation
//! 6. Otherwise tool results are appended and the loop repeats, at most 8 times
//!
//! Connections are closed on every exit path.

mod conversation;
mod dispatcher;
mod errors;
mod models;
mod runner;

pub use conversation::ConversationState;
pub use dispatcher::{ToolCallResult, ToolDispatcher, extract_message_id, render_payload};
pub use errors::{AgentError, SetupError, ToolDispatchError};
pub use models::{AgentOptions, DEFAULT_SYSTEM_PROMPT, RunOutcome};
pub use runner::Agent;
