//! Plan and step value objects produced by the planner

use crate::types::{AppError, Result};
use crate::utils::json_repair::repair_json_output;
use serde::{Deserialize, Deserializer, Serialize};

/// Which agent a step needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Research,
    Processing,
    /// Missing or unrecognised in the model output
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for StepType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "research" => StepType::Research,
            Some(s) if s == "processing" => StepType::Processing,
            _ => StepType::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub need_search: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_res: Option<String>,
}

impl Step {
    pub fn new(title: impl Into<String>, description: impl Into<String>, step_type: StepType) -> Self {
        Self {
            need_search: step_type == StepType::Research,
            title: title.into(),
            description: description.into(),
            step_type,
            execution_res: None,
        }
    }

    /// A step is done once it carries a non-empty result.
    pub fn is_done(&self) -> bool {
        self.execution_res
            .as_deref()
            .map(|res| !res.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub has_enough_context: bool,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    /// First step without a result, in list order
    pub fn next_pending(&self) -> Option<(usize, &Step)> {
        self.steps.iter().enumerate().find(|(_, step)| !step.is_done())
    }

    pub fn pending_count(&self) -> usize {
        self.steps.iter().filter(|step| !step.is_done()).count()
    }

    /// Keep at most `max_steps` steps. Returns how many were dropped.
    pub fn truncate_steps(&mut self, max_steps: usize) -> usize {
        let dropped = self.steps.len().saturating_sub(max_steps);
        self.steps.truncate(max_steps);
        dropped
    }

    /// Record the result of the step at `index`.
    ///
    /// Only the first pending step may be completed, and only once.
    pub(crate) fn record_execution(&mut self, index: usize, result: String) -> Result<()> {
        match self.next_pending() {
            Some((pending, _)) if pending == index => {
                self.steps[index].execution_res = Some(result);
                Ok(())
            }
            Some((pending, _)) => Err(AppError::Internal(format!(
                "step {} completed out of order, step {} is pending",
                index, pending
            ))),
            None => Err(AppError::Internal(format!(
                "step {} completed but the plan has no pending steps",
                index
            ))),
        }
    }
}

/// Repair and parse raw planner output.
///
/// Anything that is not a JSON object after repair is a [`AppError::MalformedPlan`].
pub fn parse_plan(raw: &str) -> Result<Plan> {
    let repaired = repair_json_output(raw);
    let value: serde_json::Value = serde_json::from_str(&repaired)
        .map_err(|e| AppError::MalformedPlan(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(AppError::MalformedPlan(
            "plan must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| AppError::MalformedPlan(e.to_string()))
}
