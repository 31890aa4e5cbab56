// src/samples.rs

//! Sample discovery: derive the set of sample identifiers from the
//! filesystem by pattern-matching existing files/directories.

use std::path::Path;

use globset::Glob;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;

/// Opaque sample identifier, unique within a run.
pub type SampleId = String;

/// Discover sample identifiers from a pattern with exactly one `*` wildcard
/// segment, e.g. `/data/project/dataset/*` or `/data/final_bins/*.faa`.
///
/// Returns the distinct wildcard values sorted lexicographically. The scan is
/// a read-only directory listing; a missing directory yields an empty set.
///
/// When `mandatory` is set, an empty match set fails with `NoSamplesFound`.
pub fn discover(fs: &dyn FileSystem, pattern: &str, mandatory: bool) -> Result<Vec<SampleId>> {
    let parts = SplitPattern::parse(pattern)?;

    let matcher = Glob::new(&parts.wildcard_component)
        .map_err(|e| PipelineError::Config(format!("invalid sample pattern '{pattern}': {e}")))?
        .compile_matcher();

    let mut ids: Vec<SampleId> = Vec::new();
    let dir = Path::new(&parts.dir);

    if fs.is_dir(dir) {
        for entry in fs.read_dir(dir)? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !matcher.is_match(name) {
                continue;
            }
            let Some(token) = parts.extract_token(name) else {
                continue;
            };
            if token.is_empty() {
                continue;
            }
            // A trailing sub-path after the wildcard segment must also exist.
            if !parts.tail.is_empty() && !fs.exists(&entry.join(&parts.tail)) {
                continue;
            }
            ids.push(token.to_string());
        }
    }

    ids.sort();
    ids.dedup();

    if ids.is_empty() && mandatory {
        return Err(PipelineError::NoSamplesFound {
            pattern: pattern.to_string(),
        });
    }

    debug!(pattern, count = ids.len(), "sample discovery complete");
    Ok(ids)
}

/// Discover samples using the conventional layout: one sub-directory per
/// sample under the configured data folder.
pub fn discover_samples(fs: &dyn FileSystem, cfg: &PipelineConfig) -> Result<Vec<SampleId>> {
    let pattern = format!("{}/{}/*", cfg.paths.root, cfg.folders.data);
    let ids = discover(fs, &pattern, true)?;
    info!(count = ids.len(), "discovered samples");
    Ok(ids)
}

/// A one-wildcard pattern split into the directory to list, the component
/// containing the `*`, and any fixed sub-path below it.
struct SplitPattern {
    dir: String,
    wildcard_component: String,
    prefix: String,
    suffix: String,
    tail: String,
}

impl SplitPattern {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.matches('*').count() != 1 {
            return Err(PipelineError::Config(format!(
                "sample pattern must contain exactly one '*' (got '{pattern}')"
            )));
        }

        let star = pattern.find('*').unwrap();
        let dir_end = pattern[..star].rfind('/').ok_or_else(|| {
            PipelineError::Config(format!(
                "sample pattern must contain a directory component before '*' (got '{pattern}')"
            ))
        })?;

        let dir = pattern[..dir_end].to_string();
        let rest = &pattern[dir_end + 1..];

        let (wildcard_component, tail) = match rest.find('/') {
            Some(slash) => (rest[..slash].to_string(), rest[slash + 1..].to_string()),
            None => (rest.to_string(), String::new()),
        };

        let comp_star = wildcard_component.find('*').unwrap();
        let prefix = wildcard_component[..comp_star].to_string();
        let suffix = wildcard_component[comp_star + 1..].to_string();

        Ok(Self {
            dir,
            wildcard_component,
            prefix,
            suffix,
            tail,
        })
    }

    fn extract_token<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
    }
}
