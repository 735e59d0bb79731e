//! Research and code agents
//!
//! An [`Agent`] takes a conversation and returns it extended with whatever it
//! produced; the content of the last message is the agent's answer. The
//! research graph never builds agents itself. It asks an [`AgentFactory`]
//! for one per step, so tests can swap in scripted agents.

pub mod react;
pub mod registry;

use crate::llm::{AgentRole, ConversationMessage};
use crate::tools::Tool;
use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use react::ReactAgent;
pub use registry::AgentRegistry;

/// The agents a plan step can be dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Researcher,
    Coder,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Researcher => "researcher",
            AgentKind::Coder => "coder",
        }
    }

    /// Model role whose client drives this agent
    pub fn role(&self) -> AgentRole {
        match self {
            AgentKind::Researcher => AgentRole::Researcher,
            AgentKind::Coder => AgentRole::Coder,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages returned by an agent invocation
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub messages: Vec<ConversationMessage>,
}

impl AgentOutput {
    pub fn new(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    /// Content of the last message, empty when there are none
    pub fn final_content(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Base trait for all agents
#[async_trait]
pub trait Agent: Send + Sync {
    /// Name the agent's messages are attributed to
    fn name(&self) -> &str;

    /// Run the agent on `messages`
    async fn invoke(&self, messages: Vec<ConversationMessage>) -> Result<AgentOutput>;
}

/// Per-step agent construction parameters
#[derive(Clone, Default)]
pub struct AgentSetup {
    /// Tools added on top of the agent's built-in ones
    pub extra_tools: Vec<Arc<dyn Tool>>,
    /// Maximum tool-calling iterations
    pub recursion_limit: usize,
    pub max_search_results: usize,
    pub locale: String,
}

/// Builds agents for plan steps
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create_agent(&self, kind: AgentKind, setup: AgentSetup) -> Result<Arc<dyn Agent>>;
}
