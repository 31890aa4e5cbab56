// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the commands of scheduled
//! nodes, using `tokio::process::Command`, and reporting back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`runner`] owns the executor loop and the per-node scratch-directory /
//!   atomic-publication contract.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` the runtime uses in production; tests replace it
//!   with a fake implementation.

pub mod backend;
pub mod runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use runner::{spawn_executor, ExecutionResult};
