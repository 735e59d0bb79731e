//! The research graph
//!
//! Coordinator → (background investigation) → planner → human feedback →
//! research team ⇄ {researcher, coder} → reporter.
//!
//! # Module Structure
//!
//! - [`plan`] - plan and step value objects, plan parsing
//! - [`state`] - workflow state and patch merging
//! - [`dispatch`] - the step dispatcher
//! - [`nodes`] - one function per graph node
//! - [`checkpoint`] - checkpoint stores for suspended runs
//! - [`events`] - progress events for streamed runs
//! - [`builder`] - the orchestrator

pub mod builder;
pub mod checkpoint;
pub mod dispatch;
pub mod events;
pub mod nodes;
pub mod plan;
pub mod state;

pub use builder::{ResearchGraph, ResearchRequest, RunOutcome};
pub use checkpoint::{
    Checkpoint, CheckpointStore, MemoryCheckpointStore, RunStatus, SqliteCheckpointStore,
};
pub use dispatch::{next_action, Action};
pub use events::{EventReceiver, EventSender, RunEvent};
pub use nodes::{Goto, NodeId};
pub use plan::{parse_plan, Plan, Step, StepType};
pub use state::{CurrentPlan, StatePatch, WorkflowState};
