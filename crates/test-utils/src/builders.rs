#![allow(dead_code)]

use std::collections::BTreeMap;

use magpipe::catalog::{StageCatalog, StageDef};
use magpipe::config::{FoldersSection, PathsSection, PipelineConfig};

/// Minimal valid config rooted at the given directory, with the conventional
/// parameter defaults filled in.
pub fn config_with_root(root: &str) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        paths: PathsSection {
            root: root.to_string(),
        },
        folders: FoldersSection::default(),
        cores: BTreeMap::new(),
        params: BTreeMap::new(),
    };
    cfg.apply_param_defaults();
    cfg
}

/// Builder for small ad-hoc stage catalogs.
///
/// Defaults every stage to the command `true` and cost 1 so tests only spell
/// out the paths they care about.
pub struct CatalogBuilder {
    stages: Vec<StageDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn stage(mut self, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        self.stages.push(StageDef::new(name, inputs, outputs, "true", 1));
        self
    }

    pub fn stage_with_cost(
        mut self,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        cost: u32,
    ) -> Self {
        self.stages.push(StageDef::new(name, inputs, outputs, "true", cost));
        self
    }

    pub fn stage_with_command(
        mut self,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        command: &str,
    ) -> Self {
        self.stages.push(StageDef::new(name, inputs, outputs, command, 1));
        self
    }

    pub fn build(self) -> StageCatalog {
        StageCatalog::new(self.stages)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-stage linear chain per sample:
///
/// `{root}/src/{sample}.txt` → fetch → assemble → bin
///
/// Used by scheduler and runtime tests that need producer/consumer edges
/// without the full builtin catalog.
pub fn chain_catalog() -> StageCatalog {
    CatalogBuilder::new()
        .stage(
            "fetch",
            &["{root}/src/{sample}.txt"],
            &["{root}/fetch/{sample}.out"],
        )
        .stage(
            "assemble",
            &["{root}/fetch/{sample}.out"],
            &["{root}/assemble/{sample}.out"],
        )
        .stage(
            "bin",
            &["{root}/assemble/{sample}.out"],
            &["{root}/bin/{sample}.out"],
        )
        .build()
}
