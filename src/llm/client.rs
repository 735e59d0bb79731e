//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for interacting with chat-completion
//! providers:
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//! - **Ollama**: local inference through Ollama's OpenAI-compatible `/v1` API
//!
//! Agents never pick a concrete model themselves. Each [`AgentRole`] is mapped
//! to a [`ModelKind`] by configuration, and an [`LLMClientFactoryTrait`]
//! implementation hands out clients for that kind.

use crate::llm::coordinator::ConversationMessage;
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stream of content chunks, in arrival order.
pub type ContentStream = Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with conversation history
    async fn generate_with_history(&self, messages: &[ConversationMessage]) -> Result<String>;

    /// Generate with tool calling support
    async fn generate_with_tools(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Generate a single JSON document (structured output mode)
    async fn generate_json(&self, messages: &[ConversationMessage]) -> Result<serde_json::Value>;

    /// Stream a completion as content chunks
    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<ContentStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_calls", "length")
    pub finish_reason: String,
    /// Token usage reported by the provider, if any
    pub usage: Option<TokenUsage>,
}

/// Token accounting for one or more requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Sampling parameters applied to every request of a client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: Some("sk-...".to_string()),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     params: GenerationParams::default(),
    /// };
    /// ```
    OpenAI {
        api_key: Option<String>,
        api_base: String,
        model: String,
        params: GenerationParams,
    },

    /// Ollama local LLM provider, reached through its OpenAI-compatible API
    Ollama {
        base_url: String,
        model: String,
        params: GenerationParams,
    },
}

impl Provider {
    /// Create a client instance for this provider
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(
                super::openai::OpenAIClient::new(api_key.clone(), api_base.clone(), model.clone())?
                    .with_params(*params),
            )),

            Provider::Ollama {
                base_url,
                model,
                params,
            } => {
                let api_base = format!("{}/v1", base_url.trim_end_matches('/'));
                Ok(Box::new(
                    super::openai::OpenAIClient::new(None, api_base, model.clone())?
                        .with_params(*params),
                ))
            }
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Class of model an agent runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Basic,
    Reasoning,
    Code,
    Vision,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Basic => "basic",
            ModelKind::Reasoning => "reasoning",
            ModelKind::Code => "code",
            ModelKind::Vision => "vision",
        }
    }
}

impl FromStr for ModelKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ModelKind::Basic),
            "reasoning" => Ok(ModelKind::Reasoning),
            "code" => Ok(ModelKind::Code),
            "vision" => Ok(ModelKind::Vision),
            other => Err(AppError::Configuration(format!(
                "Unknown model kind: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles that talk to a language model during a research run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Coordinator,
    Planner,
    Researcher,
    Coder,
    Reporter,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Coordinator,
        AgentRole::Planner,
        AgentRole::Researcher,
        AgentRole::Coder,
        AgentRole::Reporter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Planner => "planner",
            AgentRole::Researcher => "researcher",
            AgentRole::Coder => "coder",
            AgentRole::Reporter => "reporter",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-keyed client factory injected into the research graph
#[async_trait]
pub trait LLMClientFactoryTrait: Send + Sync {
    /// Model kind configured for `role`
    fn model_kind(&self, role: AgentRole) -> ModelKind;

    /// Create a client for a model kind
    async fn create_for_kind(&self, kind: ModelKind) -> Result<Box<dyn LLMClient>>;

    /// Create a client for the model kind configured for `role`
    async fn create_for_role(&self, role: AgentRole) -> Result<Box<dyn LLMClient>> {
        self.create_for_kind(self.model_kind(role)).await
    }
}
