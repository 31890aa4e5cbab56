use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use magpipe::dag::{NodeOutcome, ScheduledNode};
use magpipe::engine::RuntimeEvent;
use magpipe::errors::Result;
use magpipe::exec::ExecutorBackend;

/// A fake executor that:
/// - records which nodes were "run" (by `stage(sample)` label)
/// - immediately reports NodeCompleted for each scheduled node, succeeding
///   unless the node's label was registered with [`FakeExecutor::fail_node`].
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
        }
    }

    /// Make the node with the given `stage(sample)` label report exit code 1.
    pub fn fail_node(mut self, label: &str) -> Self {
        self.failing.insert(label.to_string());
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_nodes(
        &mut self,
        nodes: Vec<ScheduledNode>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for node in nodes {
                let label = node.label();
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(label.clone());
                }

                let (outcome, stderr_tail) = if failing.contains(&label) {
                    (NodeOutcome::Failed(1), Some("simulated failure".to_string()))
                } else {
                    (NodeOutcome::Success, None)
                };

                tx.send(RuntimeEvent::NodeCompleted {
                    id: node.id,
                    outcome,
                    stderr_tail,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
