// src/dag/node.rs

//! Node metadata and per-run state.

use std::fmt;
use std::path::PathBuf;

use crate::catalog::StageDef;
use crate::samples::SampleId;

/// Index of a node inside its [`crate::dag::PipelineGraph`].
pub type NodeId = usize;

/// Lifecycle status of one (stage, sample) unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on at least one producer.
    Pending,
    /// All producers satisfied; eligible for dispatch.
    Ready,
    /// Dispatched to the executor.
    Running,
    /// Executed successfully.
    Done,
    /// Execution failed, or an upstream producer failed.
    Failed,
    /// Outputs already exist and are no older than the inputs; satisfies
    /// consumers exactly like `Done` without executing.
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Failed | NodeState::Skipped)
    }

    /// Whether a producer in this state satisfies its consumers.
    pub fn satisfies_consumers(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Skipped)
    }
}

/// One (stage, sample) instance in the dependency graph, with resolved
/// input/output paths and structural edges.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub stage: String,
    pub sample: SampleId,
    /// Catalog position of the stage; first dispatch tie-break key.
    pub priority: usize,
    /// CPU slots claimed while running.
    pub cost: u32,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    /// Producer edges (nodes whose outputs this node consumes).
    pub producers: Vec<NodeId>,
    /// Consumer edges (nodes consuming this node's outputs).
    pub consumers: Vec<NodeId>,
    pub state: NodeState,
    /// Whether this node was named as a run target.
    pub is_target: bool,
    /// Exit code, when the node ran and finished.
    pub exit_code: Option<i32>,
    /// Tail of stderr, kept for the end-of-run report on failure.
    pub stderr_tail: Option<String>,
}

impl Node {
    /// Human-readable `stage(sample)` label used in logs and reports.
    pub fn label(&self) -> String {
        format!("{}({})", self.stage, self.sample)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.stage, self.sample)
    }
}

/// Description of a node the scheduler wants the executor to run now.
///
/// Carries everything the executor needs to render and run the command
/// without reaching back into the graph.
#[derive(Debug, Clone)]
pub struct ScheduledNode {
    pub id: NodeId,
    pub stage: StageDef,
    pub sample: SampleId,
    /// Resolved input paths (final locations, produced by upstream nodes or
    /// pre-existing source files).
    pub inputs: Vec<PathBuf>,
    /// Resolved final output paths; the executor stages outputs in a scratch
    /// directory and publishes them here by atomic rename.
    pub outputs: Vec<PathBuf>,
    pub cost: u32,
}

impl ScheduledNode {
    pub fn label(&self) -> String {
        format!("{}({})", self.stage.name, self.sample)
    }
}
