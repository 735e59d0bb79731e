//! Workflow state and the sparse patches nodes return
//!
//! Nodes never mutate [`WorkflowState`] directly. Each returns a
//! [`StatePatch`] that the orchestrator merges with [`WorkflowState::apply`]:
//! `messages` and `observations` append, every other field replaces.

use crate::graph::plan::Plan;
use crate::llm::{ConversationMessage, MessageRole};
use crate::types::{Resource, Result};
use serde::{Deserialize, Serialize};

/// The planner's latest output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "plan", rename_all = "snake_case")]
pub enum CurrentPlan {
    /// Raw planner output waiting for review
    Draft(String),
    /// Parsed plan being executed
    Accepted(Plan),
}

impl CurrentPlan {
    pub fn accepted(&self) -> Option<&Plan> {
        match self {
            CurrentPlan::Accepted(plan) => Some(plan),
            CurrentPlan::Draft(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub research_topic: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub plan_iterations: u32,
    #[serde(default)]
    pub current_plan: Option<CurrentPlan>,
    #[serde(default)]
    pub final_report: String,
    #[serde(default)]
    pub auto_accepted_plan: bool,
    #[serde(default)]
    pub enable_background_investigation: bool,
    #[serde(default)]
    pub background_investigation_results: Option<String>,
}

impl WorkflowState {
    /// Start a run from a user query
    pub fn new(query: impl Into<String>, locale: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            messages: vec![ConversationMessage::user(&query)],
            research_topic: query,
            locale: locale.into(),
            ..Default::default()
        }
    }

    /// The accepted plan, if there is one
    pub fn plan(&self) -> Option<&Plan> {
        self.current_plan.as_ref().and_then(CurrentPlan::accepted)
    }

    /// Most recent user-authored message
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && m.name.is_none())
            .map(|m| m.content.as_str())
    }

    /// Merge a node's patch into the state.
    ///
    /// A step result is validated before anything else is written, so a
    /// rejected patch leaves the state untouched.
    pub fn apply(&mut self, patch: StatePatch) -> Result<()> {
        if let Some(step) = patch.step_result {
            let plan = match self.current_plan.as_mut() {
                Some(CurrentPlan::Accepted(plan)) => plan,
                _ => {
                    return Err(crate::types::AppError::Internal(
                        "step result without an accepted plan".to_string(),
                    ))
                }
            };
            plan.record_execution(step.index, step.result.clone())?;
            self.observations.push(step.result);
        }

        self.messages.extend(patch.messages);
        self.observations.extend(patch.observations);

        if let Some(locale) = patch.locale {
            self.locale = locale;
        }
        if let Some(topic) = patch.research_topic {
            self.research_topic = topic;
        }
        if let Some(iterations) = patch.plan_iterations {
            self.plan_iterations = self.plan_iterations.max(iterations);
        }
        if let Some(plan) = patch.current_plan {
            self.current_plan = Some(plan);
        }
        if let Some(report) = patch.final_report {
            self.final_report = report;
        }
        if let Some(results) = patch.background_investigation_results {
            self.background_investigation_results = Some(results);
        }
        Ok(())
    }
}

/// Result of executing one plan step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub index: usize,
    pub result: String,
}

/// Sparse update returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub messages: Vec<ConversationMessage>,
    pub observations: Vec<String>,
    pub locale: Option<String>,
    pub research_topic: Option<String>,
    pub plan_iterations: Option<u32>,
    pub current_plan: Option<CurrentPlan>,
    pub final_report: Option<String>,
    pub background_investigation_results: Option<String>,
    /// Completes the plan's first pending step and records its observation
    pub step_result: Option<StepResult>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: ConversationMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::plan::{Step, StepType};

    fn accepted_state() -> WorkflowState {
        let mut state = WorkflowState::new("what is rust?", "en-US");
        state.current_plan = Some(CurrentPlan::Accepted(Plan {
            locale: "en-US".to_string(),
            has_enough_context: false,
            thought: String::new(),
            title: "Rust".to_string(),
            steps: vec![
                Step::new("a", "", StepType::Research),
                Step::new("b", "", StepType::Processing),
            ],
        }));
        state
    }

    #[test]
    fn test_new_state_seeds_topic_and_message() {
        let state = WorkflowState::new("what is rust?", "en-US");
        assert_eq!(state.research_topic, "what is rust?");
        assert_eq!(state.last_user_message(), Some("what is rust?"));
        assert!(state.plan().is_none());
    }

    #[test]
    fn test_messages_and_observations_append() {
        let mut state = WorkflowState::new("q", "en-US");
        let patch = StatePatch {
            observations: vec!["one".to_string()],
            ..StatePatch::new().with_message(ConversationMessage::assistant("hi", vec![]))
        };
        state.apply(patch).unwrap();
        state
            .apply(StatePatch {
                observations: vec!["two".to_string()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.observations, vec!["one", "two"]);
    }

    #[test]
    fn test_plan_iterations_never_decrease() {
        let mut state = WorkflowState::new("q", "en-US");
        state.plan_iterations = 2;
        state
            .apply(StatePatch {
                plan_iterations: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(state.plan_iterations, 2);
    }

    #[test]
    fn test_step_result_updates_plan_and_observations() {
        let mut state = accepted_state();
        state
            .apply(StatePatch {
                step_result: Some(StepResult {
                    index: 0,
                    result: "found".to_string(),
                }),
                ..Default::default()
            })
            .unwrap();
        let plan = state.plan().unwrap();
        assert_eq!(plan.steps[0].execution_res.as_deref(), Some("found"));
        assert!(plan.steps[1].execution_res.is_none());
        assert_eq!(state.observations, vec!["found"]);
    }

    #[test]
    fn test_rejected_step_result_leaves_state_unchanged() {
        let mut state = accepted_state();
        let before = state.clone();
        let result = state.apply(StatePatch {
            step_result: Some(StepResult {
                index: 1,
                result: "skipped ahead".to_string(),
            }),
            ..StatePatch::new().with_message(ConversationMessage::user("x"))
        });
        assert!(result.is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_checkpoint_serialization_keeps_plan_status() {
        let state = accepted_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);

        let draft = CurrentPlan::Draft("{}".to_string());
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["status"], "draft");
    }
}
