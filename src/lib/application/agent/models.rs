use crate::application::guard::{Decision, GuardDecision};
use crate::constants::{MAX_ITERATIONS, TERMINAL_TOOL_PREFIX};
use serde::Serialize;

pub const DEFAULT_SYSTEM_PROMPT: &str = concat!(
    "You are a helpful Logistics Assistant. ",
    "If the user asks a question about an order (e.g., status, notes, price), ",
    "answer the question based on the tool result using natural language. ",
    "ONLY call send_email if the user explicitly asks to 'process', 'ship', or 'confirm' the order. ",
    "Never send an email for 'cancelled' orders."
);

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Answer { text: String },
    Confirmation { message_id: Option<String> },
    Refused { decision: Decision, reason: String },
}

impl RunOutcome {
    pub fn refused(guard: GuardDecision) -> Self {
        RunOutcome::Refused {
            decision: guard.decision,
            reason: guard.reason,
        }
    }

    /// The single line shown to the user.
    pub fn message(&self) -> String {
        match self {
            RunOutcome::Answer { text } => text.clone(),
            RunOutcome::Confirmation {
                message_id: Some(id),
            } => format!("Shipping confirmation sent (message_id={id})."),
            RunOutcome::Confirmation { message_id: None } => {
                "Shipping confirmation sent.".to_string()
            }
            RunOutcome::Refused { decision, .. } => {
                decision.refusal_message().unwrap_or_default().to_string()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub system_prompt: String,
    pub max_iterations: usize,
    /// Dispatching a tool whose lowercased name starts with this ends the run.
    pub terminal_prefix: String,
}

impl AgentOptions {
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
            self.system_prompt = prompt;
        }
        self
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: MAX_ITERATIONS,
            terminal_prefix: TERMINAL_TOOL_PREFIX.to_string(),
        }
    }
}
