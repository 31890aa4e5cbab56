// src/report.rs

//! Aggregate run reporting.
//!
//! Execution failures are collected and reported once at the end of the run
//! alongside which nodes succeeded or were skipped, so a partial pipeline
//! failure never hides otherwise-successful branches.

use std::fmt;

use crate::dag::{NodeState, Scheduler};
use crate::errors::PipelineError;

/// Terminal record for one node.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub stage: String,
    pub sample: String,
    pub state: NodeState,
    pub is_target: bool,
    pub exit_code: Option<i32>,
    pub stderr_tail: Option<String>,
}

impl NodeReport {
    pub fn label(&self) -> String {
        format!("{}({})", self.stage, self.sample)
    }
}

/// Aggregate status of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub nodes: Vec<NodeReport>,
    pub aborted: bool,
    /// True iff at least one requested target did not end Done/Skipped.
    pub failed: bool,
}

impl RunReport {
    pub fn from_scheduler(scheduler: &Scheduler) -> Self {
        let nodes = scheduler
            .graph()
            .nodes()
            .iter()
            .map(|n| NodeReport {
                stage: n.stage.clone(),
                sample: n.sample.clone(),
                state: n.state,
                is_target: n.is_target,
                exit_code: n.exit_code,
                stderr_tail: n.stderr_tail.clone(),
            })
            .collect();

        Self {
            nodes,
            aborted: scheduler.is_aborted(),
            failed: scheduler.run_failed(),
        }
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.nodes.iter().filter(|n| n.state == state).count()
    }

    /// Nodes that never reached a terminal state (possible after an abort).
    pub fn unfinished(&self) -> usize {
        self.nodes.iter().filter(|n| !n.state.is_terminal()).count()
    }

    /// One typed error per node whose own execution failed (propagated
    /// failures carry no exit code and are excluded).
    pub fn failures(&self) -> Vec<PipelineError> {
        self.nodes
            .iter()
            .filter(|n| n.state == NodeState::Failed && n.exit_code.is_some())
            .map(|n| PipelineError::StageExecutionFailed {
                stage: n.stage.clone(),
                sample: n.sample.clone(),
                exit_code: n.exit_code.unwrap_or(-1),
                stderr_tail: n.stderr_tail.clone().unwrap_or_default(),
            })
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "run summary: {} done, {} skipped, {} failed{}",
            self.count(NodeState::Done),
            self.count(NodeState::Skipped),
            self.count(NodeState::Failed),
            if self.unfinished() > 0 {
                format!(", {} not run (aborted)", self.unfinished())
            } else {
                String::new()
            }
        )?;

        for node in &self.nodes {
            let marker = if node.is_target { " [target]" } else { "" };
            writeln!(f, "  {:<9} {}{}", format!("{:?}", node.state), node.label(), marker)?;
        }

        let failures: Vec<&NodeReport> = self
            .nodes
            .iter()
            .filter(|n| n.state == NodeState::Failed && n.exit_code.is_some())
            .collect();

        if !failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "failures:")?;
            for node in failures {
                writeln!(
                    f,
                    "  {} exited with code {}",
                    node.label(),
                    node.exit_code.unwrap_or(-1)
                )?;
                if let Some(ref tail) = node.stderr_tail {
                    for line in tail.lines() {
                        writeln!(f, "    | {line}")?;
                    }
                }
            }
        }

        Ok(())
    }
}
