//! The research graph orchestrator
//!
//! [`ResearchGraph`] owns each run's [`WorkflowState`] and drives the nodes
//! one at a time: run a node, check the transition is a declared edge, merge
//! the patch, move on. Runs suspended at the human feedback gate are
//! persisted as [`Checkpoint`]s and continue through [`ResearchGraph::resume`].
//!
//! A thread is driven by at most one caller at a time: `run` and `resume`
//! claim the thread id before looking at its checkpoint and release it when
//! the run stops.

use crate::agents::{AgentFactory, AgentKind, AgentRegistry};
use crate::graph::checkpoint::{
    Checkpoint, CheckpointStore, MemoryCheckpointStore, RunStatus, SqliteCheckpointStore,
};
use crate::graph::events::{emit, EventSender, RunEvent};
use crate::graph::nodes::background::background_investigator;
use crate::graph::nodes::coordinator::coordinator;
use crate::graph::nodes::executor::{execute_step, research_team};
use crate::graph::nodes::human_feedback::{human_feedback, parse_feedback};
use crate::graph::nodes::planner::planner;
use crate::graph::nodes::reporter::reporter;
use crate::graph::nodes::{Goto, NodeContext, NodeId, NodeOutput};
use crate::graph::state::{CurrentPlan, WorkflowState};
use crate::llm::{ConfigBasedLLMFactory, LLMClientFactoryTrait, MessageRole};
use crate::rag::Retriever;
use crate::tools::Tool;
use crate::types::{AppError, Resource, Result};
use crate::utils::settings::{ResearchSettings, RunOverrides};
use crate::utils::toml_config::{AtlasConfig, CheckpointBackend};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A new research run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, flatten)]
    pub overrides: RunOverrides,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// How a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The reporter produced a final report
    Completed {
        thread_id: String,
        final_report: String,
    },
    /// Waiting for plan review
    Interrupted { thread_id: String, plan: String },
    /// Ended without a report: the coordinator answered directly or no usable plan was produced
    Ended {
        thread_id: String,
        reply: Option<String>,
    },
}

impl RunOutcome {
    pub fn thread_id(&self) -> &str {
        match self {
            RunOutcome::Completed { thread_id, .. }
            | RunOutcome::Interrupted { thread_id, .. }
            | RunOutcome::Ended { thread_id, .. } => thread_id,
        }
    }
}

/// One in-flight run, exclusively owned by the orchestrator
struct Run {
    thread_id: String,
    state: WorkflowState,
    settings: ResearchSettings,
    steps_taken: usize,
}

pub struct ResearchGraph {
    llm: Arc<dyn LLMClientFactoryTrait>,
    agents: Arc<dyn AgentFactory>,
    retriever: Option<Arc<dyn Retriever>>,
    search: Option<Arc<dyn Tool>>,
    store: Option<Arc<dyn CheckpointStore>>,
    /// Thread ids currently being driven
    active: Mutex<HashSet<String>>,
}

/// Exclusive hold on a thread id, released on drop
struct ThreadClaim<'a> {
    active: &'a Mutex<HashSet<String>>,
    thread_id: String,
}

impl Drop for ThreadClaim<'_> {
    fn drop(&mut self) {
        self.active.lock().remove(&self.thread_id);
    }
}

impl ResearchGraph {
    /// A stateless graph: no retriever, no background search, no checkpoints
    pub fn new(llm: Arc<dyn LLMClientFactoryTrait>, agents: Arc<dyn AgentFactory>) -> Self {
        Self {
            llm,
            agents,
            retriever: None,
            search: None,
            store: None,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Build the graph described by `config`
    pub async fn from_config(config: &AtlasConfig) -> Result<Self> {
        let llm: Arc<dyn LLMClientFactoryTrait> = Arc::new(ConfigBasedLLMFactory::from_config(config));
        let agents = Arc::new(AgentRegistry::new(Arc::clone(&llm), config.tools.clone()));
        let store: Arc<dyn CheckpointStore> = match config.checkpoint.backend {
            CheckpointBackend::Memory => {
                let store = MemoryCheckpointStore::new();
                match config.checkpoint.retention_secs {
                    0 => Arc::new(store),
                    secs => Arc::new(store.with_retention(chrono::Duration::seconds(
                        secs.min(u64::from(u32::MAX)) as i64,
                    ))),
                }
            }
            CheckpointBackend::Sqlite => {
                Arc::new(SqliteCheckpointStore::open(&config.checkpoint.path).await?)
            }
        };

        #[allow(unused_mut)]
        let mut graph = Self::new(llm, agents).with_checkpoint_store(store);
        #[cfg(feature = "web-search")]
        {
            graph = graph.with_search(Arc::new(crate::tools::search::SearchTool::new(
                config.research.max_search_results,
            )));
        }
        Ok(graph)
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Search tool used by the background investigator
    pub fn with_search(mut self, search: Arc<dyn Tool>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn is_checkpointed(&self) -> bool {
        self.store.is_some()
    }

    /// Start a run
    pub async fn run(
        &self,
        request: ResearchRequest,
        settings: ResearchSettings,
    ) -> Result<RunOutcome> {
        self.start(request, settings, None).await
    }

    /// Start a run, reporting progress to `events`.
    ///
    /// The last event sent is the terminal event for the returned result.
    pub async fn run_with_events(
        &self,
        request: ResearchRequest,
        settings: ResearchSettings,
        events: &EventSender,
    ) -> Result<RunOutcome> {
        let result = self.start(request, settings, Some(events)).await;
        report(events, &result);
        result
    }

    /// Continue a run suspended at plan review.
    ///
    /// Feedback that is neither `[ACCEPTED]` nor `[EDIT_PLAN]` fails with
    /// [`AppError::ProtocolViolation`] and leaves the checkpoint untouched.
    /// A thread that another caller is driving fails with [`AppError::Conflict`].
    pub async fn resume(&self, thread_id: &str, feedback: &str) -> Result<RunOutcome> {
        self.continue_run(thread_id, feedback, None).await
    }

    /// Continue a suspended run, reporting progress to `events`
    pub async fn resume_with_events(
        &self,
        thread_id: &str,
        feedback: &str,
        events: &EventSender,
    ) -> Result<RunOutcome> {
        let result = self.continue_run(thread_id, feedback, Some(events)).await;
        report(events, &result);
        result
    }

    async fn start(
        &self,
        request: ResearchRequest,
        settings: ResearchSettings,
        events: Option<&EventSender>,
    ) -> Result<RunOutcome> {
        if request.query.trim().is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }
        let thread_id = request
            .thread_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let _claim = self.claim(&thread_id)?;
        if let Some(store) = &self.store {
            if store.get(&thread_id).await?.is_some() {
                return Err(AppError::InvalidInput(format!(
                    "Thread '{}' already exists, resume or discard it first",
                    thread_id
                )));
            }
        }

        let mut state = WorkflowState::new(request.query, settings.locale.clone());
        state.resources = request.resources;
        state.auto_accepted_plan = settings.auto_accepted_plan;
        state.enable_background_investigation = settings.enable_background_investigation;

        info!(thread_id = %thread_id, "Starting research run");
        let run = Run {
            thread_id,
            state,
            settings,
            steps_taken: 0,
        };
        self.drive(run, NodeId::Coordinator, None, events).await
    }

    async fn continue_run(
        &self,
        thread_id: &str,
        feedback: &str,
        events: Option<&EventSender>,
    ) -> Result<RunOutcome> {
        let store = self.store.as_ref().ok_or_else(|| {
            AppError::InvalidInput("Resuming requires a checkpoint store".to_string())
        })?;
        let _claim = self.claim(thread_id)?;
        let checkpoint = store
            .get(thread_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Thread not found: {}", thread_id)))?;
        if checkpoint.status != RunStatus::AwaitingReview {
            return Err(AppError::InvalidInput(format!(
                "Thread '{}' is {}, not awaiting review",
                thread_id, checkpoint.status
            )));
        }
        parse_feedback(feedback)?;

        info!(thread_id, "Resuming research run");
        let run = Run {
            thread_id: checkpoint.thread_id,
            state: checkpoint.state,
            settings: checkpoint.settings,
            steps_taken: checkpoint.steps_taken,
        };
        self.drive(run, NodeId::HumanFeedback, Some(feedback), events)
            .await
    }

    fn claim(&self, thread_id: &str) -> Result<ThreadClaim<'_>> {
        if !self.active.lock().insert(thread_id.to_string()) {
            return Err(AppError::Conflict(format!(
                "Thread '{}' is already running",
                thread_id
            )));
        }
        Ok(ThreadClaim {
            active: &self.active,
            thread_id: thread_id.to_string(),
        })
    }

    /// Load a thread's checkpoint
    pub async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        match &self.store {
            Some(store) => store.get(thread_id).await,
            None => Ok(None),
        }
    }

    /// Abandon a thread. Returns whether it existed.
    pub async fn discard(&self, thread_id: &str) -> Result<bool> {
        match &self.store {
            Some(store) => store.delete(thread_id).await,
            None => Ok(false),
        }
    }

    async fn drive(
        &self,
        mut run: Run,
        start: NodeId,
        mut feedback: Option<&str>,
        events: Option<&EventSender>,
    ) -> Result<RunOutcome> {
        let limit = run.settings.recursion_limit.max(1);
        let mut current = Goto::Node(start);

        loop {
            let node = match current {
                Goto::Node(node) => node,
                Goto::Interrupt => return self.suspend(run).await,
                Goto::End => return self.finish(run).await,
            };
            let node = if run.steps_taken >= limit && node != NodeId::Reporter {
                warn!(
                    thread_id = %run.thread_id,
                    limit,
                    skipped = %node,
                    "Graph recursion limit reached, moving to reporter"
                );
                NodeId::Reporter
            } else {
                node
            };

            emit(
                events,
                RunEvent::NodeStarted {
                    thread_id: run.thread_id.clone(),
                    node,
                },
            );
            let output = self
                .execute_node(node, &run.state, &run.settings, feedback.take())
                .await?;
            if !node.successors().contains(&output.goto) {
                return Err(AppError::Internal(format!(
                    "{} attempted an undeclared transition to {:?}",
                    node, output.goto
                )));
            }
            let messages = events.map(|_| output.patch.messages.clone());
            let completed_step = output.patch.step_result.as_ref().and_then(|step| {
                let title = run.state.plan()?.steps.get(step.index)?.title.clone();
                Some((step.index, title))
            });
            run.state.apply(output.patch)?;
            run.steps_taken += 1;

            for message in messages.into_iter().flatten() {
                emit(
                    events,
                    RunEvent::Message {
                        thread_id: run.thread_id.clone(),
                        node,
                        message,
                    },
                );
            }
            if let Some((index, title)) = completed_step {
                emit(
                    events,
                    RunEvent::StepCompleted {
                        thread_id: run.thread_id.clone(),
                        node,
                        index,
                        title,
                    },
                );
            }
            current = output.goto;

            if let Goto::Node(next) = current {
                self.persist(&run, Some(next), RunStatus::Running).await?;
            }
        }
    }

    async fn execute_node(
        &self,
        node: NodeId,
        state: &WorkflowState,
        settings: &ResearchSettings,
        feedback: Option<&str>,
    ) -> Result<NodeOutput> {
        let ctx = NodeContext {
            llm: self.llm.as_ref(),
            agents: self.agents.as_ref(),
            retriever: self.retriever.as_ref(),
            search: self.search.as_ref(),
            settings,
        };
        match node {
            NodeId::Coordinator => coordinator(state, &ctx).await,
            NodeId::BackgroundInvestigator => background_investigator(state, &ctx).await,
            NodeId::Planner => planner(state, &ctx).await,
            NodeId::HumanFeedback => human_feedback(state, settings, feedback),
            NodeId::ResearchTeam => Ok(research_team(state)),
            NodeId::Researcher => execute_step(state, &ctx, AgentKind::Researcher).await,
            NodeId::Coder => execute_step(state, &ctx, AgentKind::Coder).await,
            NodeId::Reporter => reporter(state, &ctx).await,
        }
    }

    async fn persist(&self, run: &Run, next_node: Option<NodeId>, status: RunStatus) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store
            .put(&Checkpoint {
                thread_id: run.thread_id.clone(),
                state: run.state.clone(),
                next_node,
                status,
                steps_taken: run.steps_taken,
                settings: run.settings.clone(),
                updated_at: Utc::now(),
            })
            .await
    }

    async fn suspend(&self, run: Run) -> Result<RunOutcome> {
        if self.store.is_none() {
            warn!(
                thread_id = %run.thread_id,
                "Run needs plan review but has no checkpoint store, it cannot be resumed"
            );
        }
        self.persist(&run, Some(NodeId::HumanFeedback), RunStatus::AwaitingReview)
            .await?;
        let plan = match &run.state.current_plan {
            Some(CurrentPlan::Draft(raw)) => raw.clone(),
            Some(CurrentPlan::Accepted(plan)) => serde_json::to_string_pretty(plan)?,
            None => String::new(),
        };
        info!(thread_id = %run.thread_id, "Run interrupted for plan review");
        Ok(RunOutcome::Interrupted {
            thread_id: run.thread_id,
            plan,
        })
    }

    async fn finish(&self, run: Run) -> Result<RunOutcome> {
        let completed = !run.state.final_report.is_empty();
        let status = if completed {
            RunStatus::Completed
        } else {
            RunStatus::Ended
        };
        self.persist(&run, None, status).await?;
        info!(thread_id = %run.thread_id, status = %status, steps = run.steps_taken, "Run finished");

        if completed {
            return Ok(RunOutcome::Completed {
                thread_id: run.thread_id,
                final_report: run.state.final_report,
            });
        }
        let reply = run
            .state
            .messages
            .last()
            .filter(|m| m.role == MessageRole::Assistant && m.name.as_deref() == Some("coordinator"))
            .map(|m| m.content.clone());
        Ok(RunOutcome::Ended {
            thread_id: run.thread_id,
            reply,
        })
    }

    /// Render the graph topology as a Mermaid flowchart.
    ///
    /// Fixed edges are solid, routing decisions are dotted.
    pub fn mermaid() -> String {
        let mut lines = vec![
            "flowchart TD".to_string(),
            "    __start__([__start__]) --> coordinator".to_string(),
        ];
        for node in NodeId::ALL {
            let successors = node.successors();
            let targets: Vec<&str> = successors
                .iter()
                .filter_map(|goto| match goto {
                    Goto::Node(next) => Some(next.as_str()),
                    Goto::End => Some("__end__([__end__])"),
                    Goto::Interrupt => None,
                })
                .collect();
            let arrow = if targets.len() > 1 { "-.->" } else { "-->" };
            for target in targets {
                lines.push(format!("    {} {} {}", node.as_str(), arrow, target));
            }
        }
        lines.join("\n")
    }
}

/// Send the terminal event for a finished call
fn report(events: &EventSender, result: &Result<RunOutcome>) {
    let event = match result {
        Ok(outcome) => RunEvent::from(outcome),
        Err(e) => RunEvent::Error {
            message: e.to_string(),
        },
    };
    emit(Some(events), event);
}
