use crate::graph::nodes::human_feedback::parse_feedback;
use crate::graph::{
    Checkpoint, EventReceiver, NodeId, Plan, ResearchRequest, RunOutcome, RunStatus,
};
use crate::types::{AppError, Result};
use crate::utils::settings::ResearchSettings;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Body of a plan review
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// `[ACCEPTED]...` or `[EDIT_PLAN] <instructions>`
    pub feedback: String,
}

/// Inspection view of a stored run
#[derive(Debug, Serialize)]
pub struct ResearchSummary {
    pub thread_id: String,
    pub status: RunStatus,
    pub next_node: Option<NodeId>,
    pub plan_iterations: u32,
    pub observations: usize,
    pub steps_taken: usize,
    pub plan: Option<Plan>,
    pub final_report: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Checkpoint> for ResearchSummary {
    fn from(checkpoint: Checkpoint) -> Self {
        let plan = checkpoint.state.plan().cloned();
        let state = checkpoint.state;
        Self {
            thread_id: checkpoint.thread_id,
            status: checkpoint.status,
            next_node: checkpoint.next_node,
            plan_iterations: state.plan_iterations,
            observations: state.observations.len(),
            steps_taken: checkpoint.steps_taken,
            plan,
            final_report: (!state.final_report.is_empty()).then_some(state.final_report),
            updated_at: checkpoint.updated_at,
        }
    }
}

/// Start a research run
pub async fn start_research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<RunOutcome>> {
    let config = state.config_manager.config();
    let settings = ResearchSettings::resolve(&config.research, &payload.overrides);
    info!(query = %payload.query, "Research requested");
    let outcome = state.graph.run(payload, settings).await?;
    Ok(Json(outcome))
}

/// Answer a plan review and continue the run
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<RunOutcome>> {
    let outcome = state.graph.resume(&thread_id, &payload.feedback).await?;
    Ok(Json(outcome))
}

/// Inspect a run
pub async fn get_research(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ResearchSummary>> {
    let checkpoint = state
        .graph
        .get(&thread_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Thread not found: {}", thread_id)))?;
    Ok(Json(checkpoint.into()))
}

/// Abandon a run
pub async fn discard_research(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode> {
    if state.graph.discard(&thread_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Thread not found: {}", thread_id)))
    }
}

/// Start a research run and stream its progress as server-sent events
pub async fn stream_research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    if payload.query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }
    let config = state.config_manager.config();
    let settings = ResearchSettings::resolve(&config.research, &payload.overrides);
    info!(query = %payload.query, "Streamed research requested");

    let (tx, rx) = mpsc::unbounded_channel();
    let graph = Arc::clone(&state.graph);
    tokio::spawn(async move {
        if let Err(e) = graph.run_with_events(payload, settings, &tx).await {
            warn!("Streamed research run failed: {}", e);
        }
    });
    Ok(event_stream(rx))
}

/// Answer a plan review and stream the rest of the run
pub async fn stream_feedback(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    parse_feedback(&payload.feedback)?;
    if state.graph.get(&thread_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Thread not found: {}", thread_id)));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let graph = Arc::clone(&state.graph);
    tokio::spawn(async move {
        if let Err(e) = graph
            .resume_with_events(&thread_id, &payload.feedback, &tx)
            .await
        {
            warn!(thread_id = %thread_id, "Streamed resume failed: {}", e);
        }
    });
    Ok(event_stream(rx))
}

fn event_stream(
    mut events: EventReceiver,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => yield Ok(sse),
                Err(e) => warn!("Failed to encode {} event: {}", event.name(), e),
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
