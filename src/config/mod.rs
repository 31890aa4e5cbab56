// src/config/mod.rs

//! Configuration loading and validation for magpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like folder uniqueness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{FoldersSection, PathsSection, PipelineConfig};
pub use validate::validate_config;
