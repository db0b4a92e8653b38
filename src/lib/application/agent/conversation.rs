use crate::types::{ChatMessage, ToolCallRequest};

/// Append-only message log for one run plus its cycle budget.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    iterations: usize,
    limit: usize,
    terminal: bool,
}

impl ConversationState {
    pub fn seed(system_prompt: &str, instruction: &str, limit: usize) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(format!("Instruction: {instruction}")),
            ],
            iterations: 0,
            limit,
            terminal: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Claims the next cycle. Returns false once the budget is spent or the
    /// conversation is over.
    pub fn begin_cycle(&mut self) -> bool {
        if self.terminal || self.iterations >= self.limit {
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, calls: Vec<ToolCallRequest>) {
        self.messages.push(ChatMessage::assistant(content, calls));
    }

    pub fn push_tool_result(&mut self, call: &ToolCallRequest, payload: impl Into<String>) {
        self.messages
            .push(ChatMessage::tool(call.id.clone(), call.name.clone(), payload));
    }

    pub fn finish(&mut self) {
        self.terminal = true;
    }
}
