// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::{ScheduledNode, Scheduler, SchedulerStep};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::fs::FileSystem;
use crate::report::RunReport;

use super::RuntimeEvent;

/// Drives the scheduler in response to `RuntimeEvent`s and delegates actual
/// command execution to an `ExecutorBackend`.
///
/// This is an IO shell: all scheduling decisions live in [`Scheduler`] and
/// are synchronous and deterministic; this struct only reads events from the
/// channel and forwards dispatched nodes to the executor.
pub struct Runtime<E: ExecutorBackend> {
    scheduler: Scheduler,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    fs: Arc<dyn FileSystem>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        scheduler: Scheduler,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            scheduler,
            event_rx,
            executor,
            fs,
        }
    }

    /// Main event loop.
    ///
    /// - Seeds the initial Ready set (with staleness skips) and dispatches it.
    /// - Consumes completion events, feeding them back into the scheduler.
    /// - Exits once every node is terminal (or nothing is left running after
    ///   an abort) and returns the aggregate run report.
    pub async fn run(mut self) -> Result<RunReport> {
        info!("magpipe runtime started");

        let step = self.scheduler.start(&*self.fs);
        let finished = self.apply_step(step).await?;

        if !finished {
            loop {
                let event = match self.event_rx.recv().await {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                };

                debug!(?event, "runtime received event");

                match event {
                    RuntimeEvent::NodeCompleted {
                        id,
                        outcome,
                        stderr_tail,
                    } => {
                        if let Some(tail) = stderr_tail {
                            self.scheduler.record_stderr_tail(id, tail);
                        }
                        let step = self.scheduler.handle_completion(id, outcome, &*self.fs);
                        if self.apply_step(step).await? {
                            break;
                        }
                    }
                    RuntimeEvent::ShutdownRequested => {
                        self.scheduler.abort();
                        if self.scheduler.is_finished() {
                            break;
                        }
                    }
                }
            }
        }

        info!("runtime exiting");
        Ok(RunReport::from_scheduler(&self.scheduler))
    }

    /// Forward a step's dispatched nodes to the executor. Returns whether the
    /// run is finished.
    async fn apply_step(&mut self, step: SchedulerStep) -> Result<bool> {
        self.spawn_ready(step.newly_scheduled).await?;
        Ok(step.run_finished)
    }

    async fn spawn_ready(&mut self, nodes: Vec<ScheduledNode>) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let labels: Vec<String> = nodes.iter().map(ScheduledNode::label).collect();
        debug!(?labels, "spawning ready nodes");

        self.executor.spawn_ready_nodes(nodes).await
    }
}
