// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Graph-build errors (`NoSamplesFound`, `Template`, `CycleDetected`,
//! `UnresolvedInput`, `DuplicateOutput`) are fatal and abort the run before
//! any execution starts. `StageExecutionFailed` is per-node: it fails the
//! node's transitive consumers but is collected into the end-of-run report
//! rather than aborting independent branches. `DegenerateSample` is
//! per-sample in the abundance quantifier.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No samples found matching pattern '{pattern}'")]
    NoSamplesFound { pattern: String },

    #[error("Template error in stage '{stage}': unknown key '{key}' in '{template}'")]
    Template {
        stage: String,
        template: String,
        key: String,
    },

    #[error("Cycle detected in stage graph involving node '{node}'")]
    CycleDetected { node: String },

    #[error(
        "Unresolved input for stage '{stage}' (sample '{sample}'): \
         '{path}' is not produced by any stage and does not exist on disk"
    )]
    UnresolvedInput {
        stage: String,
        sample: String,
        path: String,
    },

    #[error("Duplicate output: '{path}' is declared by both '{first}' and '{second}'")]
    DuplicateOutput {
        path: String,
        first: String,
        second: String,
    },

    #[error("Stage '{stage}' failed for sample '{sample}' (exit code {exit_code})")]
    StageExecutionFailed {
        stage: String,
        sample: String,
        exit_code: i32,
        stderr_tail: String,
    },

    #[error("Degenerate sample '{sample}': total mapped reads is zero")]
    DegenerateSample { sample: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether this error belongs to the graph-build phase.
    ///
    /// Build-phase failures are reported with a distinct exit code (2) since
    /// nothing was executed.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_)
                | PipelineError::NoSamplesFound { .. }
                | PipelineError::Template { .. }
                | PipelineError::CycleDetected { .. }
                | PipelineError::UnresolvedInput { .. }
                | PipelineError::DuplicateOutput { .. }
                | PipelineError::Toml(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
