//! Research team dispatcher and the step executor behind the researcher
//! and coder nodes

use crate::agents::{AgentKind, AgentSetup};
use crate::graph::dispatch::next_action;
use crate::graph::nodes::{NodeContext, NodeId, NodeOutput};
use crate::graph::plan::{Plan, Step};
use crate::graph::state::{StatePatch, StepResult, WorkflowState};
use crate::llm::ConversationMessage;
use crate::tools::retriever::get_retriever_tool;
use crate::types::{AppError, Resource, Result};
use tracing::{debug, info, warn};

const CITATION_REMINDER: &str = "IMPORTANT: DO NOT include inline citations in the text. \
Instead, track all sources and include a References section at the end using link reference \
format. Include an empty line between each citation for better readability. Use this format \
for each reference:\n- [Source Title](URL)\n\n- [Another Source](URL)";

const EMPTY_RESULT: &str = "The agent finished without producing a result for this step.";

pub fn research_team(state: &WorkflowState) -> NodeOutput {
    let action = next_action(state.plan());
    info!(?action, "Research team dispatching");
    NodeOutput::goto(action)
}

/// Agent input for a step: the task itself, plus resource and citation
/// instructions for the researcher.
pub fn task_messages(
    step: &Step,
    locale: &str,
    kind: AgentKind,
    resources: Option<&[Resource]>,
) -> Vec<ConversationMessage> {
    let mut messages = vec![ConversationMessage::user(format!(
        "#Task\n\n##title\n\n{}\n\n##description\n\n{}\n\n##locale\n\n{}",
        step.title, step.description, locale
    ))];

    if kind == AgentKind::Researcher {
        if let Some(resources) = resources.filter(|r| !r.is_empty()) {
            let listing: Vec<String> = resources
                .iter()
                .map(|r| match &r.description {
                    Some(description) => format!("- {} ({}): {}", r.title, r.uri, description),
                    None => format!("- {} ({})", r.title, r.uri),
                })
                .collect();
            messages.push(
                ConversationMessage::user(format!(
                    "**The user mentioned the following resource files:**\n\n{}\n\n\
                     You MUST use the **local_search_tool** to retrieve information from these files.",
                    listing.join("\n")
                ))
                .with_name("system"),
            );
        }
        messages.push(ConversationMessage::user(CITATION_REMINDER).with_name("system"));
    }
    messages
}

/// Execute the first pending step with the agent for `kind`.
///
/// Agent failures are fatal for the run and are not retried here.
pub async fn execute_step(
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
    kind: AgentKind,
) -> Result<NodeOutput> {
    let Some((index, step)) = state.plan().and_then(Plan::next_pending) else {
        warn!(agent = %kind, "No pending step to execute");
        return Ok(NodeOutput::goto(NodeId::ResearchTeam));
    };
    info!(step = %step.title, agent = %kind, "Executing step");

    let mut extra_tools = Vec::new();
    let mut resources = None;
    if kind == AgentKind::Researcher {
        if let Some(tool) = get_retriever_tool(ctx.retriever, &state.resources) {
            extra_tools.push(tool);
            resources = Some(state.resources.as_slice());
        }
    }
    let messages = task_messages(step, &state.locale, kind, resources);

    let setup = AgentSetup {
        extra_tools,
        recursion_limit: ctx.settings.agent_recursion_limit,
        max_search_results: ctx.settings.max_search_results,
        locale: state.locale.clone(),
    };
    let agent = ctx.agents.create_agent(kind, setup).await?;
    let output = agent.invoke(messages).await.map_err(|e| {
        AppError::Agent(format!("{} failed on step '{}': {}", kind, step.title, e))
    })?;

    let mut result = output.final_content().to_string();
    if result.is_empty() {
        warn!(step = %step.title, agent = %kind, "Agent returned an empty result");
        result = EMPTY_RESULT.to_string();
    }
    debug!("{} full response: {}", kind, result);
    info!(step = %step.title, agent = %kind, "Step completed");

    Ok(NodeOutput::new(
        StatePatch {
            step_result: Some(StepResult {
                index,
                result: result.clone(),
            }),
            ..StatePatch::new().with_message(ConversationMessage::user(result).with_name(kind.as_str()))
        },
        NodeId::ResearchTeam,
    ))
}
