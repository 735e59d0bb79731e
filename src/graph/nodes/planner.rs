//! Planner: asks the planning model for a plan and routes on the result

use crate::graph::nodes::{Goto, NodeContext, NodeId, NodeOutput};
use crate::graph::plan::parse_plan;
use crate::graph::state::{CurrentPlan, StatePatch, WorkflowState};
use crate::llm::{AgentRole, ContentStream, ConversationMessage, ModelKind};
use crate::prompts::{apply_prompt_template, PromptTemplate, PromptVars};
use crate::types::Result;
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

pub async fn planner(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<NodeOutput> {
    let settings = ctx.settings;
    let iterations = state.plan_iterations;
    if iterations >= settings.max_plan_iterations {
        info!(
            iterations,
            max = settings.max_plan_iterations,
            "Plan iterations exhausted, moving to reporter"
        );
        return Ok(NodeOutput::goto(NodeId::Reporter));
    }
    info!(iteration = iterations + 1, "Planner generating plan");

    let mut history = state.messages.clone();
    if iterations == 0 {
        if let Some(results) = &state.background_investigation_results {
            history.push(ConversationMessage::user(format!(
                "background investigation results of user query:\n{}\n",
                results
            )));
        }
    }
    let vars = PromptVars::new()
        .set("locale", &state.locale)
        .set("max_step_num", settings.max_step_num)
        .set("max_plan_iterations", settings.max_plan_iterations);
    let messages = apply_prompt_template(PromptTemplate::Planner, &vars, &history);

    let raw = invoke_planner(ctx, &messages).await?;
    debug!("Planner response: {}", raw);
    let patch = StatePatch::new()
        .with_message(ConversationMessage::assistant(&raw, vec![]).with_name("planner"));

    match parse_plan(&raw) {
        Err(e) => {
            warn!("Planner output is not a valid plan: {}", e);
            let goto = if iterations == 0 {
                Goto::End
            } else {
                Goto::Node(NodeId::Reporter)
            };
            Ok(NodeOutput::new(patch, goto))
        }
        Ok(mut plan) if plan.has_enough_context => {
            info!("Planner has enough context, moving to reporter");
            plan.truncate_steps(settings.max_step_num);
            let locale = (!plan.locale.is_empty()).then(|| plan.locale.clone());
            Ok(NodeOutput::new(
                StatePatch {
                    current_plan: Some(CurrentPlan::Accepted(plan)),
                    plan_iterations: Some(iterations + 1),
                    locale,
                    ..patch
                },
                NodeId::Reporter,
            ))
        }
        Ok(_) => Ok(NodeOutput::new(
            StatePatch {
                current_plan: Some(CurrentPlan::Draft(raw)),
                ..patch
            },
            NodeId::HumanFeedback,
        )),
    }
}

/// The basic model runs in JSON mode, anything else is streamed.
async fn invoke_planner(ctx: &NodeContext<'_>, messages: &[ConversationMessage]) -> Result<String> {
    let kind = if ctx.settings.enable_deep_thinking {
        ModelKind::Reasoning
    } else {
        ctx.llm.model_kind(AgentRole::Planner)
    };
    let client = ctx.llm.create_for_kind(kind).await?;

    if kind == ModelKind::Basic {
        let value = client.generate_json(messages).await?;
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let stream = client.stream_with_history(messages).await?;
    collect_stream(
        stream,
        Duration::from_secs(ctx.settings.planner_stream_timeout_secs.max(1)),
    )
    .await
}

/// Concatenate stream fragments in arrival order.
///
/// When `limit` elapses the stream is dropped and whatever arrived so far is
/// returned; JSON repair can usually close a cut-off plan.
pub async fn collect_stream(mut stream: ContentStream, limit: Duration) -> Result<String> {
    let deadline = Instant::now() + limit;
    let mut fragments: Vec<String> = Vec::new();
    loop {
        match timeout_at(deadline, stream.next()).await {
            Ok(Some(Ok(fragment))) => fragments.push(fragment),
            Ok(Some(Err(e))) => return Err(e),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    fragments = fragments.len(),
                    "Planner stream timed out after {}s",
                    limit.as_secs()
                );
                break;
            }
        }
    }
    Ok(fragments.concat())
}
