//! Step dispatcher: picks what the research team does next

use crate::graph::plan::{Plan, StepType};
use serde::{Deserialize, Serialize};

/// Routing decision made by the graph's pure decision functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Plan,
    Research,
    Code,
    Report,
    End,
}

/// Decide the next action for `plan`.
///
/// No plan, no steps, or no pending steps all go back to planning. Otherwise
/// the first pending step decides: research steps go to the researcher,
/// processing steps to the coder, and anything else is re-planned.
pub fn next_action(plan: Option<&Plan>) -> Action {
    let Some(plan) = plan else {
        return Action::Plan;
    };
    match plan.next_pending() {
        None => Action::Plan,
        Some((_, step)) => match step.step_type {
            StepType::Research => Action::Research,
            StepType::Processing => Action::Code,
            StepType::Unknown => Action::Plan,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::plan::Step;

    #[test]
    fn test_empty_plan_replans() {
        assert_eq!(next_action(None), Action::Plan);
        let plan = Plan {
            locale: "en-US".to_string(),
            has_enough_context: false,
            thought: String::new(),
            title: String::new(),
            steps: vec![],
        };
        assert_eq!(next_action(Some(&plan)), Action::Plan);
    }

    #[test]
    fn test_unknown_step_type_replans() {
        let plan = Plan {
            locale: "en-US".to_string(),
            has_enough_context: false,
            thought: String::new(),
            title: String::new(),
            steps: vec![
                Step::new("a", "", StepType::Unknown),
                Step::new("b", "", StepType::Research),
            ],
        };
        assert_eq!(next_action(Some(&plan)), Action::Plan);
    }

    #[test]
    fn test_action_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Action::Code).unwrap(), "\"CODE\"");
    }
}
