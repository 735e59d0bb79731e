//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for interacting with chat-completion
//! providers. It abstracts away provider-specific details behind common traits,
//! allowing the research graph to work with any supported model.
//!
//! # Architecture
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`LLMClientFactoryTrait`] - Role-keyed factory injected into the graph
//! - [`ProviderRegistry`] - Registry for providers and per-kind models
//! - [`ConfigBasedLLMFactory`] - Creates clients based on `atlas.toml`
//! - [`ToolCoordinator`](coordinator::ToolCoordinator) - Multi-turn tool loop used by agents
//!
//! # Streaming
//!
//! [`LLMClient::stream_with_history`] returns content chunks in arrival order;
//! callers concatenate them.

/// Core LLM client trait, model kinds and agent roles.
pub mod client;
/// Tool-calling loop and conversation message types.
pub mod coordinator;
/// OpenAI-compatible HTTP client (also used for Ollama).
pub mod openai;
/// Registry for managing multiple LLM provider instances.
pub mod provider_registry;

pub use client::{
    AgentRole, ContentStream, LLMClient, LLMClientFactoryTrait, LLMResponse, ModelKind, Provider,
};
pub use coordinator::{ConversationMessage, MessageRole, ToolCoordinator};
pub use provider_registry::{ConfigBasedLLMFactory, ProviderRegistry};
