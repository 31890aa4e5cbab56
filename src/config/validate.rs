// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::PipelineConfig;
use crate::errors::{PipelineError, Result};

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `paths.root` is non-empty and absolute
/// - all folder names are non-empty, free of path separators, and distinct
/// - all configured core counts are >= 1
///
/// It does **not** check that the root exists on disk; the sample registry
/// and graph builder surface that with more context.
pub fn validate_config(cfg: &PipelineConfig) -> Result<()> {
    validate_root(cfg)?;
    validate_folders(cfg)?;
    validate_cores(cfg)?;
    Ok(())
}

fn validate_root(cfg: &PipelineConfig) -> Result<()> {
    let root = cfg.paths.root.trim();
    if root.is_empty() {
        return Err(PipelineError::Config(
            "[paths].root must be a non-empty path".to_string(),
        ));
    }
    if !std::path::Path::new(root).is_absolute() {
        return Err(PipelineError::Config(format!(
            "[paths].root must be an absolute path (got '{root}')"
        )));
    }
    Ok(())
}

fn validate_folders(cfg: &PipelineConfig) -> Result<()> {
    let f = &cfg.folders;
    let names = [
        ("data", &f.data),
        ("qfiltered", &f.qfiltered),
        ("assemblies", &f.assemblies),
        ("metabat", &f.metabat),
        ("maxbin", &f.maxbin),
        ("concoct", &f.concoct),
        ("refined", &f.refined),
        ("reassembled", &f.reassembled),
        ("classification", &f.classification),
        ("abundance", &f.abundance),
        ("gems", &f.gems),
        ("memote", &f.memote),
        ("smetana", &f.smetana),
        ("stats", &f.stats),
        ("logs", &f.logs),
    ];

    let mut seen: HashSet<&str> = HashSet::new();
    for (key, folder) in names {
        if folder.is_empty() {
            return Err(PipelineError::Config(format!(
                "[folders].{key} must be non-empty"
            )));
        }
        if folder.contains('/') || folder.contains('\\') {
            return Err(PipelineError::Config(format!(
                "[folders].{key} must be a single folder name, not a path (got '{folder}')"
            )));
        }
        if !seen.insert(folder.as_str()) {
            return Err(PipelineError::Config(format!(
                "[folders].{key} reuses folder name '{folder}'; folders must be distinct"
            )));
        }
    }
    Ok(())
}

fn validate_cores(cfg: &PipelineConfig) -> Result<()> {
    for (stage, cores) in cfg.cores.iter() {
        if *cores == 0 {
            return Err(PipelineError::Config(format!(
                "[cores].{stage} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PipelineConfig {
        toml::from_str(
            r#"
            [paths]
            root = "/data/project"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn relative_root_is_rejected() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            [paths]
            root = "relative/dir"
            "#,
        )
        .unwrap();
        assert!(matches!(
            validate_config(&cfg),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn duplicate_folder_names_are_rejected() {
        let mut cfg = base_config();
        cfg.folders.maxbin = cfg.folders.metabat.clone();
        assert!(matches!(
            validate_config(&cfg),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn zero_cores_are_rejected() {
        let mut cfg = base_config();
        cfg.cores.insert("megahit".to_string(), 0);
        assert!(matches!(
            validate_config(&cfg),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn lookup_resolves_flat_keys() {
        let mut cfg = base_config();
        cfg.cores.insert("megahit".to_string(), 24);
        cfg.params
            .insert("cut_chunk_size".to_string(), toml::Value::Integer(10000));

        assert_eq!(cfg.lookup("root").as_deref(), Some("/data/project"));
        assert_eq!(cfg.lookup("folders.assemblies").as_deref(), Some("assemblies"));
        assert_eq!(cfg.lookup("cores.megahit").as_deref(), Some("24"));
        assert_eq!(cfg.lookup("params.cut_chunk_size").as_deref(), Some("10000"));
        assert_eq!(cfg.lookup("folders.nonexistent"), None);
        assert_eq!(cfg.lookup("bogus"), None);
    }
}
