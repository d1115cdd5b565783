//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::config::schema::{Environment, OrchestratorConfig};
use crate::config::validation::validate_config;
use crate::error::{ConfigError, Result};

/// Read a TOML file into a partial configuration document.
pub fn load_overrides(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let overrides: Value = toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
    Ok(overrides)
}

/// Load, merge over defaults and validate configuration from a TOML file.
pub fn load_config(path: &Path, env: Environment, secret: &str) -> Result<OrchestratorConfig> {
    let overrides = load_overrides(path)?;
    let defaults = OrchestratorConfig::defaults(env, secret);
    let config = OrchestratorConfig::merged(&defaults, overrides)?;

    validate_config(&config)?;

    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}
