// src/resolve.rs

//! Template resolution: expand a stage's templated paths and command for a
//! concrete sample under the active configuration.
//!
//! Resolution is pure and deterministic: identical (stage, sample, config)
//! always yields identical paths. The scheduler's staleness check and the
//! graph builder's path matching both rely on that.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::StageDef;
use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};

/// Placeholder syntax: `{sample}`, `{root}`, `{folders.x}`, `{cores.x}`,
/// `{params.x}`, `{input}`, `{output}`, `{input.N}`, `{output.N}`.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("valid placeholder regex"));

/// Literal input/output paths for one (stage, sample) node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

/// Expand the stage's input and output path templates for `sample`.
pub fn resolve_paths(
    stage: &StageDef,
    sample: &str,
    cfg: &PipelineConfig,
) -> Result<ResolvedPaths> {
    let mut inputs = Vec::with_capacity(stage.inputs.len());
    for template in &stage.inputs {
        inputs.push(PathBuf::from(substitute(
            &stage.name,
            template,
            &path_context(sample, cfg),
        )?));
    }

    let mut outputs = Vec::with_capacity(stage.outputs.len());
    for template in &stage.outputs {
        outputs.push(PathBuf::from(substitute(
            &stage.name,
            template,
            &path_context(sample, cfg),
        )?));
    }

    Ok(ResolvedPaths { inputs, outputs })
}

/// Render the stage's command template with concrete input/output paths.
///
/// The executor passes *staged* output paths here (inside the node's scratch
/// directory); publication to the final resolved paths happens afterwards by
/// atomic rename.
pub fn render_command(
    stage: &StageDef,
    sample: &str,
    cfg: &PipelineConfig,
    inputs: &[PathBuf],
    outputs: &[PathBuf],
) -> Result<String> {
    let joined_inputs = join_paths(inputs);
    let joined_outputs = join_paths(outputs);

    substitute(&stage.name, &stage.command, &|key: &str| {
        if key == "input" {
            return Some(joined_inputs.clone());
        }
        if key == "output" {
            return Some(joined_outputs.clone());
        }
        if let Some(idx) = key.strip_prefix("input.") {
            return indexed(inputs, idx);
        }
        if let Some(idx) = key.strip_prefix("output.") {
            return indexed(outputs, idx);
        }
        // A stage's own `{cores.<name>}` falls back to its effective cost, so
        // commands render without an explicit `[cores]` entry.
        if key.strip_prefix("cores.") == Some(stage.name.as_str()) {
            return Some(stage.cost(cfg).to_string());
        }
        path_context(sample, cfg)(key)
    })
}

fn path_context<'a>(
    sample: &'a str,
    cfg: &'a PipelineConfig,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key: &str| {
        if key == "sample" {
            Some(sample.to_string())
        } else {
            cfg.lookup(key)
        }
    }
}

fn indexed(paths: &[PathBuf], idx: &str) -> Option<String> {
    let idx: usize = idx.parse().ok()?;
    paths.get(idx).map(|p| p.display().to_string())
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Substitute every placeholder in `template` exactly once, erroring on the
/// first placeholder the context cannot resolve.
fn substitute(
    stage: &str,
    template: &str,
    context: &dyn Fn(&str) -> Option<String>,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let key = &caps[1];

        let value = context(key).ok_or_else(|| PipelineError::Template {
            stage: stage.to_string(),
            template: template.to_string(),
            key: key.to_string(),
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok(out)
}
