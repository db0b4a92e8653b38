use super::conversation::ConversationState;
use super::dispatcher::ToolDispatcher;
use super::errors::{AgentError, SetupError};
use super::models::{AgentOptions, RunOutcome};
use crate::application::guard::PolicyGuard;
use crate::application::tooling::{ConnectionManager, ConnectionSet, ToolRegistry};
use crate::config::ServerConfig;
use crate::infrastructure::model::{CompletionRequest, ModelProvider, ModelTurn};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Agent<P: ModelProvider + ?Sized> {
    provider: Arc<P>,
    options: AgentOptions,
}

impl<P: ModelProvider + ?Sized> Agent<P> {
    pub fn new(provider: Arc<P>, options: AgentOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Connects to `servers`, answers `instruction` and closes every
    /// connection before returning.
    pub async fn run(
        &self,
        manager: &ConnectionManager,
        servers: &[ServerConfig],
        instruction: &str,
    ) -> Result<RunOutcome, AgentError> {
        let connections = manager
            .connect_all(servers)
            .await
            .map_err(SetupError::from)?;
        self.run_on(&connections, instruction).await
    }

    /// Runs over already opened connections. They are closed on every path.
    pub async fn run_on(
        &self,
        connections: &ConnectionSet,
        instruction: &str,
    ) -> Result<RunOutcome, AgentError> {
        let result = self.drive(connections, instruction).await;
        connections.close_all().await;
        result
    }

    async fn drive(
        &self,
        connections: &ConnectionSet,
        instruction: &str,
    ) -> Result<RunOutcome, AgentError> {
        let registry = ToolRegistry::build(connections)
            .await
            .map_err(SetupError::from)?;
        info!(
            servers = connections.len(),
            tools = registry.len(),
            "Tool registry built"
        );

        let decision = PolicyGuard::new(Arc::clone(&self.provider))
            .evaluate(instruction)
            .await?;
        if !decision.is_allowed() {
            return Ok(RunOutcome::refused(decision));
        }

        self.converse(&ToolDispatcher::new(registry), instruction)
            .await
    }

    /// The completion/dispatch loop. Expects the instruction to have passed
    /// the guard already.
    pub async fn converse(
        &self,
        dispatcher: &ToolDispatcher,
        instruction: &str,
    ) -> Result<RunOutcome, AgentError> {
        let tools = dispatcher.function_specs();
        let mut state = ConversationState::seed(
            &self.options.system_prompt,
            instruction,
            self.options.max_iterations,
        );

        while state.begin_cycle() {
            debug!(
                iteration = state.iterations(),
                limit = state.limit(),
                "Requesting completion"
            );
            let request =
                CompletionRequest::new(state.messages().to_vec()).with_tools(tools.clone());

            let calls = match self.provider.complete(request).await? {
                ModelTurn::FinalText(text) => {
                    state.finish();
                    info!(iteration = state.iterations(), "Model returned final answer");
                    return Ok(RunOutcome::Answer { text });
                }
                ModelTurn::ToolCalls(calls) => calls,
            };

            state.push_assistant("", calls.clone());
            for call in &calls {
                info!("[host] tool_call -> id={} name={}", call.id, call.name);
                let result = dispatcher.dispatch(call).await?;
                info!("[host] tool_result -> {}", result.payload);

                if self.is_terminal_tool(&call.name) {
                    state.finish();
                    info!(tool = call.name.as_str(), "Terminal tool dispatched");
                    return Ok(RunOutcome::Confirmation {
                        message_id: result.message_id,
                    });
                }
                state.push_tool_result(call, result.payload);
            }
        }

        warn!(limit = state.limit(), "Conversation ran out of cycles");
        Err(AgentError::IterationExhaustion {
            limit: state.limit(),
        })
    }

    fn is_terminal_tool(&self, name: &str) -> bool {
        name.to_lowercase()
            .starts_with(&self.options.terminal_prefix.to_lowercase())
    }
}
