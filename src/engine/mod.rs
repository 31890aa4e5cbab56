// src/engine/mod.rs

//! Orchestration engine for magpipe.
//!
//! The scheduler is the sole writer of node status and runs synchronously
//! inside the runtime's event loop; executors run concurrently and report
//! back over an mpsc channel. The loop blocks only on channel receive —
//! no polling.

use crate::dag::{NodeId, NodeOutcome};

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A node's process exited (or failed to spawn) with a concrete outcome.
    NodeCompleted {
        id: NodeId,
        outcome: NodeOutcome,
        /// Last lines of stderr, kept for the failure report.
        stderr_tail: Option<String>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C): stop dispatching, let
    /// running nodes finish.
    ShutdownRequested,
}

pub mod runtime;

pub use runtime::Runtime;
