//! # Policy Guard
//!
//! Classifies an instruction as ALLOW, BLOCK or CLARIFY before any tool can
//! run. Deterministic rules are tried first, in this order:
//!
//! 1. an order id (`ORD-<digits>`) → ALLOW
//! 2. a block keyword → BLOCK
//!
//! Anything else goes to a model classifier that must answer with
//! `{"decision": ..., "reason": ...}`. Output that does not parse becomes
//! CLARIFY.

mod rules;

pub use rules::{
    BLOCK_KEYWORDS, BLOCK_MESSAGE, CLARIFY_MESSAGE, GUARD_PROMPT, contains_order_id,
    matches_block_keyword,
};

use crate::infrastructure::model::{CompletionRequest, ModelError, ModelProvider, ModelTurn};
use crate::types::ChatMessage;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ORDER_ID_REASON: &str = "Contains order id.";
pub const BLOCK_REASON: &str = "out_of_scope_or_injection";
pub const UNPARSEABLE_REASON: &str = "unparseable_guard_output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Block,
    Clarify,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block => "BLOCK",
            Decision::Clarify => "CLARIFY",
        }
    }

    /// Fixed text shown when the run stops at the guard.
    pub fn refusal_message(self) -> Option<&'static str> {
        match self {
            Decision::Allow => None,
            Decision::Block => Some(BLOCK_MESSAGE),
            Decision::Clarify => Some(CLARIFY_MESSAGE),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = GuardParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Decision::Allow),
            "BLOCK" => Ok(Decision::Block),
            "CLARIFY" => Ok(Decision::Clarify),
            _ => Err(GuardParseError::UnknownDecision(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub decision: Decision,
    pub reason: String,
}

impl GuardDecision {
    pub fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

#[derive(Debug, Error)]
pub enum GuardParseError {
    #[error("guard output is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("guard output is not a JSON object")]
    NotAnObject,
    #[error("guard output has no 'decision' field")]
    MissingDecision,
    #[error("guard output has unknown decision '{0}'")]
    UnknownDecision(String),
    #[error("guard classifier answered with tool calls")]
    ToolCalls,
}

/// Parses the classifier's JSON answer. `reason` is optional.
pub fn parse_guard_output(text: &str) -> Result<GuardDecision, GuardParseError> {
    let value: Value = serde_json::from_str(text.trim())?;
    let object = value.as_object().ok_or(GuardParseError::NotAnObject)?;
    let decision = object
        .get("decision")
        .and_then(Value::as_str)
        .ok_or(GuardParseError::MissingDecision)?
        .parse::<Decision>()?;
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(GuardDecision { decision, reason })
}

/// Decision reachable without asking the model, if any.
pub fn fast_path(instruction: &str) -> Option<GuardDecision> {
    if contains_order_id(instruction) {
        Some(GuardDecision::new(Decision::Allow, ORDER_ID_REASON))
    } else if matches_block_keyword(instruction) {
        Some(GuardDecision::new(Decision::Block, BLOCK_REASON))
    } else {
        None
    }
}

pub struct PolicyGuard<P: ModelProvider + ?Sized> {
    provider: Arc<P>,
}

impl<P: ModelProvider + ?Sized> PolicyGuard<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Classifies `instruction`. Only a failed classification request is an
    /// error; unreadable classifier output yields CLARIFY.
    pub async fn evaluate(&self, instruction: &str) -> Result<GuardDecision, ModelError> {
        if let Some(decision) = fast_path(instruction) {
            info!(
                decision = %decision.decision,
                reason = decision.reason.as_str(),
                "Guard decided without classifier"
            );
            return Ok(decision);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(GUARD_PROMPT),
            ChatMessage::user(instruction),
        ]);
        let turn = self.provider.complete(request).await?;
        let parsed = match turn {
            ModelTurn::FinalText(text) => {
                debug!(output = text.as_str(), "Guard classifier answered");
                parse_guard_output(&text)
            }
            ModelTurn::ToolCalls(_) => Err(GuardParseError::ToolCalls),
        };

        let decision = parsed.unwrap_or_else(|err| {
            warn!(%err, "Guard output unusable; asking for clarification");
            GuardDecision::new(Decision::Clarify, UNPARSEABLE_REASON)
        });
        info!(
            decision = %decision.decision,
            reason = decision.reason.as_str(),
            "Guard classifier decided"
        );
        Ok(decision)
    }
}
