//! Human feedback gate between planning and execution
//!
//! Unless the run auto-accepts plans, the gate suspends the run until a
//! reviewer answers with `[ACCEPTED]...` or `[EDIT_PLAN]...`.

use crate::graph::nodes::{Goto, NodeId, NodeOutput};
use crate::graph::plan::parse_plan;
use crate::graph::state::{CurrentPlan, StatePatch, WorkflowState};
use crate::llm::ConversationMessage;
use crate::types::{AppError, Result};
use crate::utils::settings::ResearchSettings;
use tracing::{info, warn};

const EDIT_PLAN: &str = "[EDIT_PLAN]";
const ACCEPTED: &str = "[ACCEPTED]";

/// A reviewer's answer to a suspended run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Revise the plan; carries the full feedback text
    EditPlan(String),
    Accepted,
}

fn has_prefix(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Classify feedback by its case-insensitive prefix.
pub fn parse_feedback(raw: &str) -> Result<Feedback> {
    let value = raw.trim_start();
    if has_prefix(value, EDIT_PLAN) {
        Ok(Feedback::EditPlan(value.to_string()))
    } else if has_prefix(value, ACCEPTED) {
        Ok(Feedback::Accepted)
    } else {
        Err(AppError::ProtocolViolation(raw.to_string()))
    }
}

/// Run the gate. `feedback` is `None` on first entry and the reviewer's
/// answer when a suspended run resumes.
pub fn human_feedback(
    state: &WorkflowState,
    settings: &ResearchSettings,
    feedback: Option<&str>,
) -> Result<NodeOutput> {
    if !state.auto_accepted_plan {
        let Some(raw) = feedback else {
            info!("Waiting for plan review");
            return Ok(NodeOutput::goto(Goto::Interrupt));
        };
        match parse_feedback(raw)? {
            Feedback::EditPlan(text) => {
                info!("Plan edit requested");
                return Ok(NodeOutput::new(
                    StatePatch::new()
                        .with_message(ConversationMessage::user(text).with_name("feedback")),
                    NodeId::Planner,
                ));
            }
            Feedback::Accepted => info!("Plan accepted by reviewer"),
        }
    }
    accept_plan(state, settings)
}

fn accept_plan(state: &WorkflowState, settings: &ResearchSettings) -> Result<NodeOutput> {
    let iterations = state.plan_iterations;
    let raw = match &state.current_plan {
        Some(CurrentPlan::Draft(raw)) => raw.clone(),
        Some(CurrentPlan::Accepted(plan)) => serde_json::to_string(plan)?,
        None => String::new(),
    };

    let mut plan = match parse_plan(&raw) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Accepted plan is not valid: {}", e);
            let goto = if iterations > 0 {
                Goto::Node(NodeId::Reporter)
            } else {
                Goto::End
            };
            return Ok(NodeOutput::goto(goto));
        }
    };

    let dropped = plan.truncate_steps(settings.max_step_num);
    if dropped > 0 {
        warn!(
            dropped,
            max = settings.max_step_num,
            "Plan has too many steps, truncating"
        );
    }
    let next = if plan.has_enough_context {
        NodeId::Reporter
    } else {
        NodeId::ResearchTeam
    };
    let locale = (!plan.locale.is_empty()).then(|| plan.locale.clone());
    Ok(NodeOutput::new(
        StatePatch {
            current_plan: Some(CurrentPlan::Accepted(plan)),
            plan_iterations: Some(iterations + 1),
            locale,
            ..Default::default()
        },
        next,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feedback_prefixes() {
        assert_eq!(
            parse_feedback("[accepted] ship it").unwrap(),
            Feedback::Accepted
        );
        assert_eq!(
            parse_feedback("[Edit_Plan] add a step").unwrap(),
            Feedback::EditPlan("[Edit_Plan] add a step".to_string())
        );
        assert!(matches!(
            parse_feedback("accepted"),
            Err(AppError::ProtocolViolation(_))
        ));
        assert!(matches!(parse_feedback(""), Err(AppError::ProtocolViolation(_))));
        assert!(matches!(parse_feedback("é"), Err(AppError::ProtocolViolation(_))));
    }

    #[test]
    fn test_interrupts_without_feedback() {
        let state = WorkflowState::new("q", "en-US");
        let output = human_feedback(&state, &ResearchSettings::default(), None).unwrap();
        assert_eq!(output.goto, Goto::Interrupt);
        assert!(output.patch.is_empty());
    }

    #[test]
    fn test_auto_accept_ignores_missing_feedback() {
        let mut state = WorkflowState::new("q", "en-US");
        state.auto_accepted_plan = true;
        state.current_plan = Some(CurrentPlan::Draft(
            r#"{"locale":"de-DE","has_enough_context":false,"title":"t","thought":"","steps":[{"title":"a","description":"","step_type":"research"}]}"#
                .to_string(),
        ));
        let output = human_feedback(&state, &ResearchSettings::default(), None).unwrap();
        assert_eq!(output.goto, Goto::Node(NodeId::ResearchTeam));
        assert_eq!(output.patch.plan_iterations, Some(1));
        assert_eq!(output.patch.locale.as_deref(), Some("de-DE"));
    }

    #[test]
    fn test_invalid_draft_on_first_iteration_ends() {
        let mut state = WorkflowState::new("q", "en-US");
        state.current_plan = Some(CurrentPlan::Draft("nope".to_string()));
        let output =
            human_feedback(&state, &ResearchSettings::default(), Some("[ACCEPTED]")).unwrap();
        assert_eq!(output.goto, Goto::End);

        state.plan_iterations = 1;
        let output =
            human_feedback(&state, &ResearchSettings::default(), Some("[ACCEPTED]")).unwrap();
        assert_eq!(output.goto, Goto::Node(NodeId::Reporter));
    }

    #[test]
    fn test_accepted_plan_with_enough_context_goes_to_reporter() {
        let mut state = WorkflowState::new("q", "en-US");
        state.current_plan = Some(CurrentPlan::Draft(
            r#"{"locale":"en-US","has_enough_context":true,"title":"t","thought":"","steps":[]}"#
                .to_string(),
        ));
        let output =
            human_feedback(&state, &ResearchSettings::default(), Some("[ACCEPTED] looks good"))
                .unwrap();
        assert_eq!(output.goto, Goto::Node(NodeId::Reporter));
        assert_eq!(output.patch.plan_iterations, Some(1));
    }

    #[test]
    fn test_garbage_feedback_is_rejected() {
        let mut state = WorkflowState::new("q", "en-US");
        state.current_plan = Some(CurrentPlan::Draft("{}".to_string()));
        let before = state.clone();
        let err = human_feedback(&state, &ResearchSettings::default(), Some("garbage")).unwrap_err();
        assert!(matches!(err, AppError::ProtocolViolation(v) if v == "garbage"));
        assert_eq!(state, before);
    }
}
