//! Agent registry: builds the research and code agents for plan steps
//!
//! Each step gets a fresh agent so that per-step tools (the local retriever)
//! and the resolved recursion limit never leak into another step or run.

use crate::agents::react::ReactAgent;
use crate::agents::{Agent, AgentFactory, AgentKind, AgentSetup};
use crate::llm::coordinator::{ToolCallingConfig, ToolCoordinator};
use crate::llm::LLMClientFactoryTrait;
use crate::prompts::{render, PromptTemplate, PromptVars};
use crate::tools::python_repl::PythonReplTool;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::utils::settings::DEFAULT_AGENT_RECURSION_LIMIT;
use crate::utils::toml_config::ToolsConfig;
use crate::types::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Factory for the agents a plan can dispatch to
pub struct AgentRegistry {
    /// Role-keyed LLM client factory
    llm_factory: Arc<dyn LLMClientFactoryTrait>,
    /// Tool execution settings shared by all agents
    tools_config: ToolsConfig,
}

impl AgentRegistry {
    pub fn new(llm_factory: Arc<dyn LLMClientFactoryTrait>, tools_config: ToolsConfig) -> Self {
        Self {
            llm_factory,
            tools_config,
        }
    }

    /// Built-in tools for an agent kind
    pub fn builtin_tools(&self, kind: AgentKind, setup: &AgentSetup) -> Vec<Arc<dyn Tool>> {
        match kind {
            AgentKind::Researcher => research_tools(setup.max_search_results),
            AgentKind::Coder => vec![Arc::new(PythonReplTool::new(
                self.tools_config.python_timeout_secs,
            ))],
        }
    }

    fn tool_registry(&self, kind: AgentKind, setup: &AgentSetup) -> ToolRegistry {
        let builtin = self.builtin_tools(kind, setup);
        ToolRegistry::from_tools(builtin.into_iter().chain(setup.extra_tools.iter().cloned()))
    }

    fn calling_config(&self, setup: &AgentSetup) -> ToolCallingConfig {
        let max_iterations = if setup.recursion_limit > 0 {
            setup.recursion_limit
        } else {
            DEFAULT_AGENT_RECURSION_LIMIT
        };
        ToolCallingConfig {
            max_iterations,
            parallel_execution: self.tools_config.parallel_tool_calls,
            tool_timeout: Duration::from_secs(self.tools_config.tool_timeout_secs.max(1)),
        }
    }
}

#[cfg(feature = "web-search")]
fn research_tools(max_search_results: usize) -> Vec<Arc<dyn Tool>> {
    use crate::tools::search::{CrawlTool, SearchTool};
    vec![
        Arc::new(SearchTool::new(max_search_results)),
        Arc::new(CrawlTool::new()),
    ]
}

#[cfg(not(feature = "web-search"))]
fn research_tools(_max_search_results: usize) -> Vec<Arc<dyn Tool>> {
    Vec::new()
}

#[async_trait]
impl AgentFactory for AgentRegistry {
    async fn create_agent(&self, kind: AgentKind, setup: AgentSetup) -> Result<Arc<dyn Agent>> {
        let client = self.llm_factory.create_for_role(kind.role()).await?;
        let registry = Arc::new(self.tool_registry(kind, &setup));
        debug!(
            agent = %kind,
            model = client.model_name(),
            tools = ?registry.tool_names(),
            "Creating agent"
        );

        let template = match kind {
            AgentKind::Researcher => PromptTemplate::Researcher,
            AgentKind::Coder => PromptTemplate::Coder,
        };
        let system_prompt = render(template, &PromptVars::new().set("locale", &setup.locale));
        let coordinator = ToolCoordinator::new(client, registry, self.calling_config(&setup));

        Ok(Arc::new(ReactAgent::new(
            kind.as_str(),
            system_prompt,
            coordinator,
        )))
    }
}
