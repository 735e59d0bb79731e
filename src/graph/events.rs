//! Progress events emitted while a run executes
//!
//! A caller that wants to watch a run passes an [`EventSender`] to
//! [`ResearchGraph::run_with_events`](crate::graph::ResearchGraph::run_with_events)
//! or [`ResearchGraph::resume_with_events`](crate::graph::ResearchGraph::resume_with_events).
//! Every run ends with exactly one terminal event: `interrupt`, `completed`,
//! `ended` or `error`.

use crate::graph::builder::RunOutcome;
use crate::graph::nodes::NodeId;
use crate::llm::ConversationMessage;
use serde::Serialize;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<RunEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// A node is about to run
    NodeStarted { thread_id: String, node: NodeId },
    /// A node added a message to the conversation
    Message {
        thread_id: String,
        node: NodeId,
        message: ConversationMessage,
    },
    /// A plan step received its result
    StepCompleted {
        thread_id: String,
        node: NodeId,
        index: usize,
        title: String,
    },
    /// The run is waiting for plan review
    Interrupt { thread_id: String, plan: String },
    Completed {
        thread_id: String,
        final_report: String,
    },
    Ended {
        thread_id: String,
        reply: Option<String>,
    },
    Error { message: String },
}

impl RunEvent {
    /// Event name, as used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::NodeStarted { .. } => "node_started",
            RunEvent::Message { .. } => "message",
            RunEvent::StepCompleted { .. } => "step_completed",
            RunEvent::Interrupt { .. } => "interrupt",
            RunEvent::Completed { .. } => "completed",
            RunEvent::Ended { .. } => "ended",
            RunEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Interrupt { .. }
                | RunEvent::Completed { .. }
                | RunEvent::Ended { .. }
                | RunEvent::Error { .. }
        )
    }
}

impl From<&RunOutcome> for RunEvent {
    fn from(outcome: &RunOutcome) -> Self {
        match outcome.clone() {
            RunOutcome::Completed {
                thread_id,
                final_report,
            } => RunEvent::Completed {
                thread_id,
                final_report,
            },
            RunOutcome::Interrupted { thread_id, plan } => RunEvent::Interrupt { thread_id, plan },
            RunOutcome::Ended { thread_id, reply } => RunEvent::Ended { thread_id, reply },
        }
    }
}

/// Send an event if someone is listening.
///
/// A listener that went away does not stop the run; its progress is still
/// checkpointed.
pub(crate) fn emit(events: Option<&EventSender>, event: RunEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}
