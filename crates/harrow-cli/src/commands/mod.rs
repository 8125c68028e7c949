//! CLI command implementations.

pub mod config;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use harrow_config::HarrowConfig;

/// Loads an explicit file when given, the layered project configuration otherwise.
pub fn load(project: &Path, file: Option<&Path>) -> Result<HarrowConfig> {
    match file {
        Some(path) => HarrowConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => HarrowConfig::load_from_dir(project).with_context(|| {
            format!("Failed to load configuration from {}", project.display())
        }),
    }
}
