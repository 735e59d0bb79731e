//! # Atlas - multi-agent deep research
//!
//! Atlas turns a question into a research plan, executes the plan's steps
//! with a web research agent and a Python code agent, and writes a final
//! report from their observations. Plans can be reviewed by a human before
//! they run; suspended runs are checkpointed and resumed by thread id.
//!
//! Atlas can be used in two ways:
//!
//! 1. **As a binary** - `atlas run`, `atlas serve`
//! 2. **As a library** - embed [`ResearchGraph`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use atlas::{AtlasConfig, ResearchGraph, ResearchRequest, ResearchSettings, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AtlasConfig::load("atlas.toml")?;
//!     let graph = ResearchGraph::from_config(&config).await?;
//!
//!     let request = ResearchRequest::new("How do Rust async runtimes differ?");
//!     let settings = ResearchSettings::resolve(&config.research, &request.overrides);
//!     match graph.run(request, settings).await? {
//!         RunOutcome::Completed { final_report, .. } => println!("{}", final_report),
//!         RunOutcome::Interrupted { thread_id, plan } => {
//!             println!("review {}:\n{}", thread_id, plan);
//!             graph.resume(&thread_id, "[ACCEPTED]").await?;
//!         }
//!         RunOutcome::Ended { reply, .. } => println!("{}", reply.unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `web-search` | DuckDuckGo search and page crawling for the researcher (default) |
//!
//! ## Modules
//!
//! - [`graph`] - Plan model, dispatcher, nodes, orchestrator and checkpoints
//! - [`agents`] - Research and code agents
//! - [`llm`] - LLM clients, tool-calling loop and role-keyed client factory
//! - [`tools`] - Web search, crawling, Python execution, local retrieval
//! - [`rag`] - Retriever abstraction and an in-memory BM25 retriever
//! - [`prompts`] - Prompt templates
//! - [`api`] - HTTP API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`utils`] - Configuration, per-run settings, JSON repair
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Research and code agents.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// The research graph.
pub mod graph;
/// LLM provider clients and abstractions.
pub mod llm;
/// Prompt templates.
pub mod prompts;
/// Retrieval over user-supplied resources.
pub mod rag;
/// Built-in tools.
pub mod tools;
/// Core types and errors.
pub mod types;
/// Configuration and helpers.
pub mod utils;

// Re-export commonly used types
pub use agents::{Agent, AgentFactory, AgentRegistry};
pub use graph::{ResearchGraph, ResearchRequest, RunOutcome};
pub use llm::{ConfigBasedLLMFactory, LLMClient, LLMClientFactoryTrait, ProviderRegistry};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::settings::{ResearchSettings, RunOverrides};
pub use utils::toml_config::{AtlasConfig, AtlasConfigManager};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support
    pub config_manager: Arc<AtlasConfigManager>,
    /// The research graph serving all runs
    pub graph: Arc<ResearchGraph>,
}
