//! Tool-using agent built on the [`ToolCoordinator`] loop

use crate::agents::{Agent, AgentOutput};
use crate::llm::coordinator::{FinishReason, ToolCoordinator};
use crate::llm::{ConversationMessage, MessageRole};
use crate::types::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// An agent that alternates between model calls and tool calls until the
/// model answers without requesting a tool.
pub struct ReactAgent {
    name: String,
    system_prompt: String,
    coordinator: ToolCoordinator,
}

impl ReactAgent {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        coordinator: ToolCoordinator,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            coordinator,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Names of the tools this agent may call
    pub fn tool_names(&self) -> Vec<String> {
        self.coordinator.registry().tool_names()
    }
}

#[async_trait]
impl Agent for ReactAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, messages: Vec<ConversationMessage>) -> Result<AgentOutput> {
        let mut input = Vec::with_capacity(messages.len() + 1);
        input.push(ConversationMessage::system(&self.system_prompt));
        input.extend(messages);

        let result = self.coordinator.execute(input).await?;
        info!(
            agent = %self.name,
            iterations = result.iterations,
            tool_calls = result.tool_calls.len(),
            finish_reason = %result.finish_reason,
            "Agent finished"
        );
        if result.finish_reason != FinishReason::Stop {
            warn!(agent = %self.name, "Agent stopped early: {}", result.finish_reason);
        }

        let mut history = result.message_history;
        // The answer is always the last message, even when the loop ended on a tool result.
        let ends_with_answer = history
            .last()
            .map(|m| m.role == MessageRole::Assistant && m.content == result.content)
            .unwrap_or(false);
        if !ends_with_answer {
            history.push(ConversationMessage::assistant(&result.content, vec![]));
        }

        Ok(AgentOutput::new(
            history
                .into_iter()
                .filter(|m| m.role != MessageRole::System)
                .collect(),
        ))
    }
}
