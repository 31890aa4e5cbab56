// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// Mirrors the layout of metaGEM-style pipeline configs:
///
/// ```toml
/// [paths]
/// root = "/data/project"
///
/// [folders]
/// assemblies = "assemblies"
///
/// [cores]
/// megahit = 24
///
/// [params]
/// cut_chunk_size = 10000
/// ```
///
/// All sections except `[paths]` are optional and have defaults matching the
/// conventional folder layout.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Filesystem roots from `[paths]`.
    pub paths: PathsSection,

    /// Per-pipeline-folder names from `[folders]`.
    #[serde(default)]
    pub folders: FoldersSection,

    /// Per-stage CPU slot counts from `[cores]`, keyed by stage name.
    #[serde(default)]
    pub cores: BTreeMap<String, u32>,

    /// Named tunable tool parameters from `[params]`.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Root directory under which all pipeline folders live.
    pub root: String,
}

/// `[folders]` section: one sub-folder per pipeline output kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FoldersSection {
    pub data: String,
    pub qfiltered: String,
    pub assemblies: String,
    pub metabat: String,
    pub maxbin: String,
    pub concoct: String,
    pub refined: String,
    pub reassembled: String,
    pub classification: String,
    pub abundance: String,
    pub gems: String,
    pub memote: String,
    pub smetana: String,
    pub stats: String,
    pub logs: String,
}

impl Default for FoldersSection {
    fn default() -> Self {
        Self {
            data: "dataset".to_string(),
            qfiltered: "qfiltered".to_string(),
            assemblies: "assemblies".to_string(),
            metabat: "metabat".to_string(),
            maxbin: "maxbin".to_string(),
            concoct: "concoct".to_string(),
            refined: "refined_bins".to_string(),
            reassembled: "reassembled_bins".to_string(),
            classification: "GTDBtk".to_string(),
            abundance: "abundance".to_string(),
            gems: "GEMs".to_string(),
            memote: "memote".to_string(),
            smetana: "SMETANA".to_string(),
            stats: "stats".to_string(),
            logs: "logs".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Flat key lookup used by the path/command template resolver.
    ///
    /// Supported keys: `root`, `folders.<name>`, `cores.<stage>`,
    /// `params.<name>`. Returns `None` for unknown keys; the resolver turns
    /// that into a `Template` error naming the offending template.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if key == "root" {
            return Some(self.paths.root.clone());
        }

        if let Some(folder) = key.strip_prefix("folders.") {
            return self.folder_by_name(folder).map(|s| s.to_string());
        }

        if let Some(stage) = key.strip_prefix("cores.") {
            return self.cores.get(stage).map(|n| n.to_string());
        }

        if let Some(param) = key.strip_prefix("params.") {
            return self.params.get(param).map(toml_value_to_string);
        }

        None
    }

    /// Fill in the conventional tool parameters for any `[params]` key the
    /// user left unset, so the builtin catalog resolves out of the box.
    pub fn apply_param_defaults(&mut self) {
        use toml::Value;

        let defaults: [(&str, Value); 6] = [
            ("cut_chunk_size", Value::Integer(10_000)),
            ("min_bin_length", Value::Integer(1_500)),
            ("completeness", Value::Integer(50)),
            ("contamination", Value::Integer(10)),
            ("carve_media", Value::String("M8".to_string())),
            ("smetana_solver", Value::String("gurobi".to_string())),
        ];

        for (key, value) in defaults {
            self.params.entry(key.to_string()).or_insert(value);
        }
    }

    fn folder_by_name(&self, name: &str) -> Option<&str> {
        let f = &self.folders;
        let folder = match name {
            "data" => &f.data,
            "qfiltered" => &f.qfiltered,
            "assemblies" => &f.assemblies,
            "metabat" => &f.metabat,
            "maxbin" => &f.maxbin,
            "concoct" => &f.concoct,
            "refined" => &f.refined,
            "reassembled" => &f.reassembled,
            "classification" => &f.classification,
            "abundance" => &f.abundance,
            "gems" => &f.gems,
            "memote" => &f.memote,
            "smetana" => &f.smetana,
            "stats" => &f.stats,
            "logs" => &f.logs,
            _ => return None,
        };
        Some(folder.as_str())
    }
}

/// Render a TOML scalar the way it would appear on a command line.
fn toml_value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
