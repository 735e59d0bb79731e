//! Graph nodes
//!
//! Every node reads the current [`WorkflowState`](crate::graph::state::WorkflowState)
//! and returns a [`NodeOutput`]: a sparse patch plus where control goes next.

pub mod background;
pub mod coordinator;
pub mod executor;
pub mod human_feedback;
pub mod planner;
pub mod reporter;

use crate::agents::AgentFactory;
use crate::graph::dispatch::Action;
use crate::graph::state::StatePatch;
use crate::llm::LLMClientFactoryTrait;
use crate::rag::Retriever;
use crate::tools::Tool;
use crate::utils::settings::ResearchSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Named nodes of the research graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Coordinator,
    BackgroundInvestigator,
    Planner,
    HumanFeedback,
    ResearchTeam,
    Researcher,
    Coder,
    Reporter,
}

impl NodeId {
    pub const ALL: [NodeId; 8] = [
        NodeId::Coordinator,
        NodeId::BackgroundInvestigator,
        NodeId::Planner,
        NodeId::HumanFeedback,
        NodeId::ResearchTeam,
        NodeId::Researcher,
        NodeId::Coder,
        NodeId::Reporter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Coordinator => "coordinator",
            NodeId::BackgroundInvestigator => "background_investigator",
            NodeId::Planner => "planner",
            NodeId::HumanFeedback => "human_feedback",
            NodeId::ResearchTeam => "research_team",
            NodeId::Researcher => "researcher",
            NodeId::Coder => "coder",
            NodeId::Reporter => "reporter",
        }
    }

    /// Targets this node may transfer control to
    pub fn successors(&self) -> &'static [Goto] {
        use Goto::{End, Interrupt, Node};
        match self {
            NodeId::Coordinator => &[
                Node(NodeId::BackgroundInvestigator),
                Node(NodeId::Planner),
                End,
            ],
            NodeId::BackgroundInvestigator => &[Node(NodeId::Planner)],
            NodeId::Planner => &[Node(NodeId::HumanFeedback), Node(NodeId::Reporter), End],
            NodeId::HumanFeedback => &[
                Interrupt,
                Node(NodeId::Planner),
                Node(NodeId::ResearchTeam),
                Node(NodeId::Reporter),
                End,
            ],
            NodeId::ResearchTeam => &[
                Node(NodeId::Planner),
                Node(NodeId::Researcher),
                Node(NodeId::Coder),
            ],
            NodeId::Researcher | NodeId::Coder => &[Node(NodeId::ResearchTeam)],
            NodeId::Reporter => &[End],
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where control goes after a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goto {
    Node(NodeId),
    /// Suspend the run until feedback arrives
    Interrupt,
    End,
}

impl From<Action> for Goto {
    fn from(action: Action) -> Self {
        match action {
            Action::Plan => Goto::Node(NodeId::Planner),
            Action::Research => Goto::Node(NodeId::Researcher),
            Action::Code => Goto::Node(NodeId::Coder),
            Action::Report => Goto::Node(NodeId::Reporter),
            Action::End => Goto::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub patch: StatePatch,
    pub goto: Goto,
}

impl NodeOutput {
    pub fn new(patch: StatePatch, goto: impl Into<Goto>) -> Self {
        Self {
            patch,
            goto: goto.into(),
        }
    }

    /// Transfer control without changing the state
    pub fn goto(goto: impl Into<Goto>) -> Self {
        Self::new(StatePatch::default(), goto)
    }
}

impl From<NodeId> for Goto {
    fn from(node: NodeId) -> Self {
        Goto::Node(node)
    }
}

/// Collaborators a node may call
pub struct NodeContext<'a> {
    pub llm: &'a dyn LLMClientFactoryTrait,
    pub agents: &'a dyn AgentFactory,
    pub retriever: Option<&'a Arc<dyn Retriever>>,
    /// Search tool used for background investigation
    pub search: Option<&'a Arc<dyn Tool>>,
    pub settings: &'a ResearchSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_targets_are_dispatcher_successors() {
        for action in [Action::Plan, Action::Research, Action::Code] {
            assert!(NodeId::ResearchTeam
                .successors()
                .contains(&Goto::from(action)));
        }
    }

    #[test]
    fn test_only_human_feedback_interrupts() {
        for node in NodeId::ALL {
            let interrupts = node.successors().contains(&Goto::Interrupt);
            assert_eq!(interrupts, node == NodeId::HumanFeedback, "{}", node);
        }
    }
}
