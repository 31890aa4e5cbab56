// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::catalog::StageCatalog;
use crate::fs::FileSystem;

use super::graph::PipelineGraph;
use super::node::{Node, NodeId, NodeState, ScheduledNode};

/// What to do with the rest of the graph after a node fails.
///
/// Transitive consumers of the failed node are always failed without
/// executing; the policy only governs *independent* branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Independent branches run to completion (default).
    #[default]
    KeepGoing,
    /// Stop dispatching new nodes after the first failure; nodes already
    /// running finish normally.
    StopOnError,
}

/// Structured result of a single scheduler step.
///
/// Useful for tests that manually step the DAG and assert on what changed.
#[derive(Debug, Clone)]
pub struct SchedulerStep {
    /// Nodes dispatched for execution in this step.
    pub newly_scheduled: Vec<ScheduledNode>,
    /// Labels of nodes newly marked Failed (the failing node and any
    /// transitive consumers).
    pub newly_failed: Vec<String>,
    /// Labels of nodes newly promoted to Skipped by the staleness check.
    pub newly_skipped: Vec<String>,
    /// Whether every node is now terminal (or unreachable after an abort).
    pub run_finished: bool,
}

/// Outcome of one node's execution, reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Success,
    Failed(i32),
}

/// Scheduler: sole writer of node status.
///
/// Holds the immutable graph structure plus mutable per-node state, and is
/// responsible for:
/// - promoting nodes whose producers are satisfied to Ready
/// - promoting already-satisfied nodes to Skipped via the staleness check
/// - dispatching Ready nodes deterministically under the concurrency budget
/// - failing transitive consumers of a failed node
#[derive(Debug)]
pub struct Scheduler {
    graph: PipelineGraph,
    catalog: StageCatalog,
    /// Global concurrency budget in CPU slots.
    jobs: u32,
    policy: FailurePolicy,
    /// Slots currently claimed by Running nodes (clamped costs).
    in_flight: HashMap<NodeId, u32>,
    /// Set on user abort or on first failure under StopOnError; stops all
    /// further dispatch but lets Running nodes finish.
    aborted: bool,
}

impl Scheduler {
    pub fn new(
        graph: PipelineGraph,
        catalog: StageCatalog,
        jobs: u32,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            graph,
            catalog,
            jobs: jobs.max(1),
            policy,
            in_flight: HashMap::new(),
            aborted: false,
        }
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Stop dispatching new nodes; Running nodes are left to finish.
    pub fn abort(&mut self) {
        if !self.aborted {
            info!("abort requested; no further nodes will be dispatched");
            self.aborted = true;
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether every node is terminal or the run can no longer progress.
    pub fn is_finished(&self) -> bool {
        let all_terminal = self
            .graph
            .nodes()
            .iter()
            .all(|n| n.state.is_terminal());
        if all_terminal {
            return true;
        }
        // After an abort, the run is finished once nothing is running.
        self.aborted && self.in_flight.is_empty()
    }

    /// Whether at least one requested target ended Failed (or never ran
    /// because of an abort).
    pub fn run_failed(&self) -> bool {
        self.graph
            .targets()
            .iter()
            .any(|&id| !self.graph.node(id).state.satisfies_consumers())
    }

    /// Initial step: promote and skip from the graph's sources, then dispatch.
    pub fn start(&mut self, fs: &dyn FileSystem) -> SchedulerStep {
        let newly_skipped = self.promote_and_skip(fs);
        let newly_scheduled = self.dispatch();
        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Handle the completion of a Running node, then re-evaluate downstream
    /// nodes and dispatch.
    pub fn handle_completion(
        &mut self,
        id: NodeId,
        outcome: NodeOutcome,
        fs: &dyn FileSystem,
    ) -> SchedulerStep {
        self.in_flight.remove(&id);

        let mut newly_failed = Vec::new();
        {
            let node = self.graph.node_mut(id);
            if node.state != NodeState::Running {
                warn!(node = %node.label(), state = ?node.state, "completion for node that is not Running; ignoring");
            }
            match outcome {
                NodeOutcome::Success => {
                    node.state = NodeState::Done;
                    node.exit_code = Some(0);
                    debug!(node = %node.label(), "node completed successfully");
                }
                NodeOutcome::Failed(code) => {
                    node.state = NodeState::Failed;
                    node.exit_code = Some(code);
                    warn!(node = %node.label(), exit_code = code, "node failed; failing transitive consumers");
                    newly_failed.push(node.label());
                    let mut downstream = self.fail_consumers(id);
                    newly_failed.append(&mut downstream);
                    if self.policy == FailurePolicy::StopOnError {
                        self.abort();
                    }
                }
            }
        }

        let newly_skipped = self.promote_and_skip(fs);
        let newly_scheduled = self.dispatch();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Attach the tail of a failed node's stderr for the final report.
    pub fn record_stderr_tail(&mut self, id: NodeId, tail: String) {
        self.graph.node_mut(id).stderr_tail = Some(tail);
    }

    /// Promote Pending nodes whose producers are all satisfied to Ready, and
    /// Ready nodes whose outputs are already up to date to Skipped. Repeats
    /// until a fixpoint, since a Skipped producer can satisfy its consumers.
    fn promote_and_skip(&mut self, fs: &dyn FileSystem) -> Vec<String> {
        let mut newly_skipped = Vec::new();

        loop {
            let mut changed = false;

            let promotable: Vec<NodeId> = self
                .graph
                .nodes()
                .iter()
                .filter(|n| n.state == NodeState::Pending && self.producers_satisfied(n))
                .map(|n| n.id)
                .collect();

            for id in promotable {
                self.graph.node_mut(id).state = NodeState::Ready;
                changed = true;
            }

            let skippable: Vec<NodeId> = self
                .graph
                .nodes()
                .iter()
                .filter(|n| n.state == NodeState::Ready && is_fresh(n, fs))
                .map(|n| n.id)
                .collect();

            for id in skippable {
                let node = self.graph.node_mut(id);
                node.state = NodeState::Skipped;
                debug!(node = %node.label(), "outputs up to date; skipping");
                newly_skipped.push(node.label());
                changed = true;
            }

            if !changed {
                break;
            }
        }

        newly_skipped
    }

    fn producers_satisfied(&self, node: &Node) -> bool {
        node.producers
            .iter()
            .all(|&pid| self.graph.node(pid).state.satisfies_consumers())
    }

    /// Dispatch Ready nodes in (catalog priority, sample) order while their
    /// cumulative cost fits the remaining budget.
    ///
    /// A node whose cost exceeds the whole budget is clamped so it can still
    /// run (alone) rather than deadlocking the run.
    fn dispatch(&mut self) -> Vec<ScheduledNode> {
        if self.aborted {
            return Vec::new();
        }

        let mut candidates: Vec<NodeId> = self
            .graph
            .nodes()
            .iter()
            .filter(|n| n.state == NodeState::Ready)
            .map(|n| n.id)
            .collect();

        candidates.sort_by(|&a, &b| {
            let na = self.graph.node(a);
            let nb = self.graph.node(b);
            (na.priority, &na.sample).cmp(&(nb.priority, &nb.sample))
        });

        let mut budget_left = self
            .jobs
            .saturating_sub(self.in_flight.values().copied().sum::<u32>());
        let mut scheduled = Vec::new();

        for id in candidates {
            let cost = self.graph.node(id).cost.min(self.jobs);
            if cost > budget_left {
                continue;
            }
            budget_left -= cost;
            self.in_flight.insert(id, cost);

            let node = self.graph.node_mut(id);
            node.state = NodeState::Running;
            info!(node = %node.label(), cost, "dispatching node");
            scheduled.push(id);
        }

        scheduled
            .into_iter()
            .map(|id| self.to_scheduled(id))
            .collect()
    }

    fn to_scheduled(&self, id: NodeId) -> ScheduledNode {
        let node = self.graph.node(id);
        ScheduledNode {
            id,
            stage: self
                .catalog
                .get(&node.stage)
                .expect("node stage exists in catalog")
                .clone(),
            sample: node.sample.clone(),
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            cost: node.cost,
        }
    }

    /// Mark all transitive consumers of `failed` as Failed, without
    /// executing them. Returns labels of nodes newly failed.
    fn fail_consumers(&mut self, failed: NodeId) -> Vec<String> {
        let mut stack: Vec<NodeId> = self.graph.node(failed).consumers.clone();
        let mut newly_failed = Vec::new();

        while let Some(id) = stack.pop() {
            let state = self.graph.node(id).state;
            // Running nodes finish on their own; terminal states are kept.
            if matches!(state, NodeState::Pending | NodeState::Ready) {
                let node = self.graph.node_mut(id);
                node.state = NodeState::Failed;
                debug!(node = %node.label(), "failed due to upstream failure");
                newly_failed.push(node.label());
                stack.extend(self.graph.node(id).consumers.iter().copied());
            }
        }

        newly_failed
    }
}

/// Staleness check: every declared output exists and no output is older than
/// any input. A node with no declared outputs is never fresh.
///
/// This is deliberately stronger than the original workflow's "output
/// directory exists" shortcut: modification times are compared.
pub fn is_fresh(node: &Node, fs: &dyn FileSystem) -> bool {
    if node.outputs.is_empty() {
        return false;
    }

    let mut oldest_output = None;
    for output in &node.outputs {
        match fs.modified(output) {
            Some(mtime) => {
                oldest_output = Some(match oldest_output {
                    Some(prev) if prev < mtime => prev,
                    _ => mtime,
                });
            }
            None => return false,
        }
    }
    let Some(oldest_output) = oldest_output else {
        return false;
    };

    for input in &node.inputs {
        match fs.modified(input) {
            Some(mtime) if mtime <= oldest_output => {}
            // Missing or newer input: the node must run.
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::fs::MockFileSystem;

    fn node_with_paths(inputs: &[&str], outputs: &[&str]) -> Node {
        Node {
            id: 0,
            stage: "stage".to_string(),
            sample: "s1".to_string(),
            priority: 0,
            cost: 1,
            inputs: inputs.iter().map(PathBuf::from).collect(),
            outputs: outputs.iter().map(PathBuf::from).collect(),
            producers: Vec::new(),
            consumers: Vec::new(),
            state: NodeState::Pending,
            is_target: false,
            exit_code: None,
            stderr_tail: None,
        }
    }

    #[test]
    fn node_without_outputs_is_never_fresh() {
        let fs = MockFileSystem::new();
        let node = node_with_paths(&["/in.txt"], &[]);
        fs.add_file("/in.txt", 1);
        assert!(!is_fresh(&node, &fs));
    }

    #[test]
    fn missing_output_is_stale() {
        let fs = MockFileSystem::new();
        fs.add_file("/in.txt", 1);
        let node = node_with_paths(&["/in.txt"], &["/out.txt"]);
        assert!(!is_fresh(&node, &fs));
    }

    #[test]
    fn output_older_than_input_is_stale() {
        let fs = MockFileSystem::new();
        fs.add_file("/in.txt", 10);
        fs.add_file("/out.txt", 5);
        let node = node_with_paths(&["/in.txt"], &["/out.txt"]);
        assert!(!is_fresh(&node, &fs));
    }

    #[test]
    fn missing_input_is_stale() {
        let fs = MockFileSystem::new();
        fs.add_file("/out.txt", 5);
        let node = node_with_paths(&["/in.txt"], &["/out.txt"]);
        assert!(!is_fresh(&node, &fs));
    }

    #[test]
    fn outputs_newer_than_all_inputs_are_fresh() {
        let fs = MockFileSystem::new();
        fs.add_file("/a.txt", 1);
        fs.add_file("/b.txt", 2);
        fs.add_file("/out1.txt", 3);
        fs.add_file("/out2.txt", 4);
        let node = node_with_paths(&["/a.txt", "/b.txt"], &["/out1.txt", "/out2.txt"]);
        assert!(is_fresh(&node, &fs));
    }

    #[test]
    fn oldest_output_is_what_counts() {
        let fs = MockFileSystem::new();
        fs.add_file("/in.txt", 3);
        fs.add_file("/out1.txt", 2); // older than the input
        fs.add_file("/out2.txt", 9);
        let node = node_with_paths(&["/in.txt"], &["/out1.txt", "/out2.txt"]);
        assert!(!is_fresh(&node, &fs));
    }
}
