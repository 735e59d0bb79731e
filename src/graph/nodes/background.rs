//! Background investigation: a web search on the topic before planning

use crate::graph::nodes::{NodeContext, NodeId, NodeOutput};
use crate::graph::state::{StatePatch, WorkflowState};
use crate::types::Result;
use serde_json::{json, Value};
use tracing::{info, warn};

pub async fn background_investigator(
    state: &WorkflowState,
    ctx: &NodeContext<'_>,
) -> Result<NodeOutput> {
    info!(topic = %state.research_topic, "Background investigation");
    let Some(search) = ctx.search else {
        warn!("No search tool configured, skipping background investigation");
        return Ok(NodeOutput::goto(NodeId::Planner));
    };

    match search
        .execute(json!({ "query": state.research_topic }))
        .await
    {
        Ok(value) => {
            let results = format_results(&value, ctx.settings.max_search_results);
            Ok(NodeOutput::new(
                StatePatch {
                    background_investigation_results: Some(results),
                    ..Default::default()
                },
                NodeId::Planner,
            ))
        }
        Err(e) => {
            warn!("Background search failed, planning without it: {}", e);
            Ok(NodeOutput::goto(NodeId::Planner))
        }
    }
}

/// Render search hits as `## title\n\ncontent` blocks.
pub fn format_results(value: &Value, max_results: usize) -> String {
    match value.get("results").and_then(Value::as_array) {
        Some(results) => results
            .iter()
            .take(max_results.max(1))
            .map(|hit| {
                let title = hit.get("title").and_then(Value::as_str).unwrap_or_default();
                let content = hit.get("content").and_then(Value::as_str).unwrap_or_default();
                format!("## {}\n\n{}", title, content)
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_results() {
        let value = json!({"results": [
            {"title": "Rust", "url": "https://rust-lang.org", "content": "A language"},
            {"title": "Cargo", "content": "Package manager"},
            {"title": "Extra", "content": "dropped"}
        ]});
        assert_eq!(
            format_results(&value, 2),
            "## Rust\n\nA language\n\n## Cargo\n\nPackage manager"
        );
    }

    #[test]
    fn test_format_unexpected_shape() {
        assert_eq!(format_results(&json!("raw"), 3), "\"raw\"");
    }
}
