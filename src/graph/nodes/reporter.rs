//! Reporter: writes the final report from the plan and observations

use crate::graph::nodes::{Goto, NodeContext, NodeOutput};
use crate::graph::state::{StatePatch, WorkflowState};
use crate::llm::{AgentRole, ConversationMessage};
use crate::prompts::{apply_prompt_template, PromptTemplate, PromptVars};
use crate::types::Result;
use tracing::{debug, info};

const FORMAT_REMINDER: &str = "IMPORTANT: Structure your report according to the format in the \
prompt. Remember to include:\n\n1. Key Points - A bulleted list of the most important \
findings\n2. Overview - A brief introduction to the topic\n3. Detailed Analysis - Organized into \
logical sections\n4. Key Citations - List all references at the end\n\nFor citations, DO NOT \
include inline citations in the text. Instead, place all citations in the 'Key Citations' \
section at the end using the format: `- [Source Title](URL)`. Include an empty line between each \
citation for better readability.\n\nPRIORITIZE USING MARKDOWN TABLES for data presentation and \
comparison.";

/// Messages sent to the reporter model
pub fn report_messages(state: &WorkflowState) -> Vec<ConversationMessage> {
    let task = match state.plan() {
        Some(plan) => format!(
            "# Research Requirements\n\n## Task\n\n{}\n\n## Description\n\n{}",
            plan.title, plan.thought
        ),
        None => format!("# Research Requirements\n\n## Task\n\n{}", state.research_topic),
    };
    let vars = PromptVars::new().set("locale", &state.locale);
    let mut messages = apply_prompt_template(
        PromptTemplate::Reporter,
        &vars,
        &[ConversationMessage::user(task)],
    );
    messages.push(ConversationMessage::user(FORMAT_REMINDER).with_name("system"));
    for observation in &state.observations {
        messages.push(
            ConversationMessage::user(format!(
                "Below is some observations for the user query:\n\n{}",
                observation
            ))
            .with_name("observation"),
        );
    }
    messages
}

pub async fn reporter(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<NodeOutput> {
    info!(observations = state.observations.len(), "Reporter writing final report");
    let messages = report_messages(state);
    debug!("Reporter input: {:?}", messages);

    let client = ctx.llm.create_for_role(AgentRole::Reporter).await?;
    let report = client.generate_with_history(&messages).await?;
    info!(chars = report.len(), "Report written");

    Ok(NodeOutput::new(
        StatePatch {
            final_report: Some(report.clone()),
            ..StatePatch::new()
                .with_message(ConversationMessage::assistant(report, vec![]).with_name("reporter"))
        },
        Goto::End,
    ))
}
