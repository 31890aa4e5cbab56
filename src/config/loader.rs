// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::PipelineConfig;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from a given path without semantic validation.
///
/// This only performs TOML deserialization; use [`load_and_validate`] for the
/// recommended entry point.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: PipelineConfig = toml::from_str(&contents)?;
    config.apply_param_defaults();

    Ok(config)
}

/// Load a configuration file from path and run semantic validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks root path sanity, folder name uniqueness and core counts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}
