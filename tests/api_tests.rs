//! HTTP API tests driving the research graph through axum-test

mod common;

use atlas::api::routes::app;
use atlas::graph::{MemoryCheckpointStore, ResearchGraph};
use atlas::{AppState, AtlasConfig, AtlasConfigManager};
use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{handoff, plan_json, MockAgentFactory, MockLLMFactory, Reply, Script};
use serde_json::{json, Value};
use std::sync::Arc;

fn create_test_server(script: Script) -> TestServer {
    let graph = ResearchGraph::new(
        Arc::new(MockLLMFactory::new(script)),
        Arc::new(MockAgentFactory::new()),
    )
    .with_checkpoint_store(Arc::new(MemoryCheckpointStore::new()));

    let state = AppState {
        config_manager: Arc::new(AtlasConfigManager::from_config(AtlasConfig::default())),
        graph: Arc::new(graph),
    };
    TestServer::new(app(state)).expect("Failed to create test server")
}

fn research_body(query: &str, auto_accept: bool) -> Value {
    json!({
        "query": query,
        "thread_id": "thread-api",
        "auto_accepted_plan": auto_accept,
        "enable_background_investigation": false,
        "enable_deep_thinking": false,
        "max_plan_iterations": 1,
    })
}

fn one_step_plan() -> Reply {
    Reply::Json(plan_json(false, &[("Collect sources", "research")]))
}

// ============= Health =============

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(Script::default());

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

// ============= Research Runs =============

#[tokio::test]
async fn test_auto_accepted_research_completes() {
    let server = create_test_server(Script::new([
        handoff("tides"),
        one_step_plan(),
        Reply::Text("# Tides".to_string()),
    ]));

    let response = server
        .post("/api/research")
        .json(&research_body("Why are there tides?", true))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["thread_id"], "thread-api");
    assert_eq!(body["final_report"], "# Tides");
}

#[tokio::test]
async fn test_review_flow_over_http() {
    let script = Script::new([handoff("tides"), one_step_plan()]);
    let server = create_test_server(script.clone());

    let response = server
        .post("/api/research")
        .json(&research_body("Why are there tides?", false))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "interrupted");
    assert!(body["plan"].as_str().unwrap().contains("Collect sources"));

    let response = server.get("/api/research/thread-api").await;
    response.assert_status_ok();
    let summary: Value = response.json();
    assert_eq!(summary["status"], "awaiting_review");
    assert_eq!(summary["next_node"], "human_feedback");
    assert_eq!(summary["plan_iterations"], 0);

    script.push(Reply::Text("# Tides".to_string()));
    let response = server
        .post("/api/research/thread-api/feedback")
        .json(&json!({"feedback": "[ACCEPTED]"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "completed");

    let summary: Value = server.get("/api/research/thread-api").await.json();
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["observations"], 1);
    assert_eq!(summary["final_report"], "# Tides");
    assert_eq!(summary["plan"]["steps"][0]["execution_res"], "research findings");
}

#[tokio::test]
async fn test_invalid_feedback_is_bad_request() {
    let server = create_test_server(Script::new([handoff("tides"), one_step_plan()]));

    server
        .post("/api/research")
        .json(&research_body("Why are there tides?", false))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/research/thread-api/feedback")
        .json(&json!({"feedback": "ok"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("'ok'"));

    let summary: Value = server.get("/api/research/thread-api").await.json();
    assert_eq!(summary["status"], "awaiting_review");
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let server = create_test_server(Script::default());

    let response = server
        .post("/api/research")
        .json(&json!({"query": "   "}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_thread() {
    let server = create_test_server(Script::default());

    server
        .get("/api/research/nope")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/api/research/nope")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post("/api/research/nope/feedback")
        .json(&json!({"feedback": "[ACCEPTED]"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_discard_run() {
    let server = create_test_server(Script::new([handoff("tides"), one_step_plan()]));

    server
        .post("/api/research")
        .json(&research_body("Why are there tides?", false))
        .await
        .assert_status_ok();

    server
        .delete("/api/research/thread-api")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get("/api/research/thread-api")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_model_failure_is_server_error() {
    let server = create_test_server(Script::new([Reply::Fail]));

    let response = server
        .post("/api/research")
        .json(&research_body("Why are there tides?", true))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

// ============= Streaming =============

/// `(event name, data)` for every event in an SSE body
fn sse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = serde_json::from_str::<Value>(value.trim()).ok();
                }
            }
            Some((name?, data?))
        })
        .collect()
}

fn started_nodes(events: &[(String, Value)]) -> Vec<String> {
    events
        .iter()
        .filter(|(name, _)| name == "node_started")
        .map(|(_, data)| data["node"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_streamed_review_flow() {
    let script = Script::new([handoff("tides"), one_step_plan()]);
    let server = create_test_server(script.clone());

    let response = server
        .post("/api/research/stream")
        .json(&research_body("Why are there tides?", false))
        .await;
    response.assert_status_ok();
    let events = sse_events(&response.text());

    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["node_started", "node_started", "message", "node_started", "interrupt"]
    );
    assert_eq!(
        started_nodes(&events),
        vec!["coordinator", "planner", "human_feedback"]
    );
    assert_eq!(events[2].1["node"], "planner");
    let (_, interrupt) = events.last().unwrap();
    assert_eq!(interrupt["thread_id"], "thread-api");
    assert!(interrupt["plan"].as_str().unwrap().contains("Collect sources"));

    script.push(Reply::Text("# Tides".to_string()));
    let response = server
        .post("/api/research/thread-api/feedback/stream")
        .json(&json!({"feedback": "[ACCEPTED]"}))
        .await;
    response.assert_status_ok();
    let events = sse_events(&response.text());

    assert_eq!(
        started_nodes(&events),
        vec![
            "human_feedback",
            "research_team",
            "researcher",
            "research_team",
            "planner",
            "reporter"
        ]
    );
    let step = events
        .iter()
        .position(|(name, _)| name == "step_completed")
        .unwrap();
    assert_eq!(events[step].1["title"], "Collect sources");
    assert_eq!(events[step].1["index"], 0);
    assert_eq!(events[step - 1].0, "message");
    assert_eq!(events[step - 1].1["message"]["content"], "research findings");

    let (name, done) = events.last().unwrap();
    assert_eq!(name, "completed");
    assert_eq!(done["final_report"], "# Tides");
    assert_eq!(
        events.iter().filter(|(name, _)| name == "completed").count(),
        1
    );
}

#[tokio::test]
async fn test_streamed_run_reports_failure_as_event() {
    let server = create_test_server(Script::new([Reply::Fail]));

    let response = server
        .post("/api/research/stream")
        .json(&research_body("Why are there tides?", true))
        .await;
    response.assert_status_ok();
    let events = sse_events(&response.text());

    let (name, data) = events.last().unwrap();
    assert_eq!(name, "error");
    assert!(data["message"].as_str().unwrap().contains("Mock LLM failure"));
}

#[tokio::test]
async fn test_streamed_feedback_is_validated_up_front() {
    let server = create_test_server(Script::new([handoff("tides"), one_step_plan()]));

    server
        .post("/api/research/stream")
        .json(&json!({"query": " "}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/research/nope/feedback/stream")
        .json(&json!({"feedback": "[ACCEPTED]"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post("/api/research")
        .json(&research_body("Why are there tides?", false))
        .await
        .assert_status_ok();
    server
        .post("/api/research/thread-api/feedback/stream")
        .json(&json!({"feedback": "sure"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
