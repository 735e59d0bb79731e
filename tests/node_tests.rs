//! Node-level tests driving single graph nodes with scripted collaborators

mod common;

use atlas::agents::AgentKind;
use atlas::graph::nodes::executor::execute_step;
use atlas::graph::nodes::planner::planner;
use atlas::graph::nodes::{Goto, NodeContext, NodeId};
use atlas::graph::plan::{Plan, Step, StepType};
use atlas::graph::state::{CurrentPlan, WorkflowState};
use atlas::utils::settings::ResearchSettings;
use common::mocks::{MockAgentFactory, MockLLMFactory, Reply, Script};
use serde_json::json;

fn context<'a>(
    llm: &'a MockLLMFactory,
    agents: &'a MockAgentFactory,
    settings: &'a ResearchSettings,
) -> NodeContext<'a> {
    NodeContext {
        llm,
        agents,
        retriever: None,
        search: None,
        settings,
    }
}

fn executing_state(done: &[bool]) -> WorkflowState {
    let mut state = WorkflowState::new("How do tides work?", "en-US");
    let steps = done
        .iter()
        .enumerate()
        .map(|(i, &d)| Step {
            execution_res: d.then(|| format!("earlier result {}", i)),
            ..Step::new(format!("step {}", i), "details", StepType::Research)
        })
        .collect();
    state.current_plan = Some(CurrentPlan::Accepted(Plan {
        locale: "en-US".to_string(),
        has_enough_context: false,
        thought: String::new(),
        title: "Tides".to_string(),
        steps,
    }));
    state
}

#[tokio::test]
async fn test_planner_at_iteration_limit_goes_to_reporter_without_model_call() {
    let script = Script::new([Reply::Json(json!({"unused": true}))]);
    let llm = MockLLMFactory::new(script.clone());
    let agents = MockAgentFactory::new();
    let settings = ResearchSettings {
        max_plan_iterations: 1,
        ..Default::default()
    };

    let mut state = WorkflowState::new("q", "en-US");
    state.plan_iterations = 1;
    let output = planner(&state, &context(&llm, &agents, &settings))
        .await
        .unwrap();

    assert_eq!(output.goto, Goto::Node(NodeId::Reporter));
    assert!(output.patch.is_empty());
    assert!(script.calls().is_empty());
    assert_eq!(script.remaining(), 1);
}

#[tokio::test]
async fn test_executor_completes_only_the_first_pending_step() {
    let llm = MockLLMFactory::new(Script::default());
    let agents = MockAgentFactory::new();
    let settings = ResearchSettings::default();

    let mut state = executing_state(&[true, false, false]);
    let output = execute_step(
        &state,
        &context(&llm, &agents, &settings),
        AgentKind::Researcher,
    )
    .await
    .unwrap();
    assert_eq!(output.goto, Goto::Node(NodeId::ResearchTeam));

    let observations_before = state.observations.len();
    state.apply(output.patch).unwrap();

    let plan = state.plan().unwrap();
    assert_eq!(
        plan.steps[0].execution_res.as_deref(),
        Some("earlier result 0")
    );
    assert_eq!(
        plan.steps[1].execution_res.as_deref(),
        Some("research findings")
    );
    assert!(plan.steps[2].execution_res.is_none());
    assert_eq!(state.observations.len(), observations_before + 1);
    assert_eq!(state.observations.last().unwrap(), "research findings");

    let last = state.messages.last().unwrap();
    assert_eq!(last.content, "research findings");
    assert_eq!(last.name.as_deref(), Some("researcher"));
}

#[tokio::test]
async fn test_executor_without_pending_step_changes_nothing() {
    let llm = MockLLMFactory::new(Script::default());
    let agents = MockAgentFactory::new();
    let settings = ResearchSettings::default();

    let state = executing_state(&[true, true]);
    let output = execute_step(&state, &context(&llm, &agents, &settings), AgentKind::Coder)
        .await
        .unwrap();

    assert_eq!(output.goto, Goto::Node(NodeId::ResearchTeam));
    assert!(output.patch.is_empty());
    assert!(agents.invocations().is_empty());
}

#[tokio::test]
async fn test_stale_step_result_is_rejected_without_changes() {
    let llm = MockLLMFactory::new(Script::default());
    let agents = MockAgentFactory::new();
    let settings = ResearchSettings::default();

    let state = executing_state(&[false, false]);
    let output = execute_step(
        &state,
        &context(&llm, &agents, &settings),
        AgentKind::Researcher,
    )
    .await
    .unwrap();

    // Another result landed first; the same patch can no longer apply.
    let mut advanced = executing_state(&[true, false]);
    let before = advanced.clone();
    assert!(advanced.apply(output.patch).is_err());
    assert_eq!(advanced, before);
}
