//! Coordinator: decides whether a query needs the research pipeline

use crate::graph::nodes::{Goto, NodeContext, NodeId, NodeOutput};
use crate::graph::state::{StatePatch, WorkflowState};
use crate::llm::{AgentRole, ConversationMessage};
use crate::prompts::{apply_prompt_template, PromptTemplate, PromptVars};
use crate::types::{Result, ToolDefinition};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const HANDOFF_TOOL: &str = "handoff_to_planner";

/// The only tool bound to the coordinator model
pub fn handoff_tool() -> ToolDefinition {
    ToolDefinition {
        name: HANDOFF_TOOL.to_string(),
        description: "Hand the request off to the planner to build a research plan.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "research_topic": {
                    "type": "string",
                    "description": "The topic of the research task to be handed off."
                },
                "locale": {
                    "type": "string",
                    "description": "The user's detected language locale (e.g. en-US, zh-CN)."
                }
            },
            "required": ["research_topic", "locale"]
        }),
    }
}

/// Handoff arguments, each optional
#[derive(Debug, Default, PartialEq)]
pub struct HandoffArgs {
    pub research_topic: Option<String>,
    pub locale: Option<String>,
}

impl HandoffArgs {
    /// Extract arguments, ignoring anything missing or of the wrong shape.
    pub fn from_value(arguments: &Value) -> Self {
        let Some(map) = arguments.as_object() else {
            warn!("Handoff arguments are not an object, using defaults: {}", arguments);
            return Self::default();
        };
        let field = |name: &str| match map.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                warn!("Ignoring handoff argument '{}': {}", name, other);
                None
            }
        };
        Self {
            research_topic: field("research_topic"),
            locale: field("locale"),
        }
    }
}

pub async fn coordinator(state: &WorkflowState, ctx: &NodeContext<'_>) -> Result<NodeOutput> {
    info!("Coordinator talking");
    let vars = PromptVars::new().set("locale", &state.locale);
    let messages = apply_prompt_template(PromptTemplate::Coordinator, &vars, &state.messages);

    let client = ctx.llm.create_for_role(AgentRole::Coordinator).await?;
    let response = client
        .generate_with_tools(&messages, &[handoff_tool()])
        .await?;
    debug!("Coordinator response: {:?}", response);

    let Some(call) = response.tool_calls.iter().find(|c| c.name == HANDOFF_TOOL) else {
        if !response.tool_calls.is_empty() {
            warn!(
                "Coordinator called unexpected tools: {:?}",
                response.tool_calls.iter().map(|c| &c.name).collect::<Vec<_>>()
            );
        }
        info!("Coordinator answered directly, ending run");
        let mut patch = StatePatch::new();
        if !response.content.is_empty() {
            patch = patch.with_message(
                ConversationMessage::assistant(&response.content, vec![]).with_name("coordinator"),
            );
        }
        return Ok(NodeOutput::new(patch, Goto::End));
    };

    let args = HandoffArgs::from_value(&call.arguments);
    let research_topic = args
        .research_topic
        .or_else(|| state.last_user_message().map(str::to_string))
        .unwrap_or_else(|| state.research_topic.clone());
    let locale = args.locale.unwrap_or_else(|| state.locale.clone());
    info!(topic = %research_topic, locale = %locale, "Handing off to planner");

    let next = if state.enable_background_investigation {
        NodeId::BackgroundInvestigator
    } else {
        NodeId::Planner
    };
    Ok(NodeOutput::new(
        StatePatch {
            locale: Some(locale),
            research_topic: Some(research_topic),
            ..Default::default()
        },
        next,
    ))
}
