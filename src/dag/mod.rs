// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`node`] defines the (stage, sample) node, its lifecycle states and the
//!   `ScheduledNode` handed to the executor.
//! - [`graph`] builds and validates the dependency graph from the stage
//!   catalog and the discovered samples.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   nodes are ready, skipped, dispatched or failed.

pub mod graph;
pub mod node;
pub mod scheduler;

pub use graph::PipelineGraph;
pub use node::{Node, NodeId, NodeState, ScheduledNode};
pub use scheduler::{is_fresh, FailurePolicy, NodeOutcome, Scheduler, SchedulerStep};
