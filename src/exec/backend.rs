// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`super::runner`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::dag::ScheduledNode;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::runner::spawn_executor;

/// Trait abstracting how scheduled nodes are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Dispatch the given nodes for execution.
    ///
    /// The implementation is free to:
    /// - spawn OS processes (production)
    /// - simulate completion and emit `RuntimeEvent`s (tests)
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
///
/// Wraps the background executor loop in [`spawn_executor`]; the runtime
/// calls `spawn_ready_nodes`, which forwards the nodes over an mpsc channel.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ScheduledNode>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender. Spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, cfg: Arc<PipelineConfig>) -> Self {
        let tx = spawn_executor(runtime_tx, cfg);
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for node in nodes {
                let label = node.label();
                tx.send(node).await.map_err(|_| {
                    anyhow::anyhow!("executor channel closed while dispatching '{label}'")
                })?;
            }
            Ok(())
        })
    }
}
