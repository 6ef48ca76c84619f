//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::WorkspaceConfig;
use std::path::Path;

/// The configuration file name looked up in a workspace directory.
pub const CONFIG_FILE: &str = "keel.toml";

/// Loads and validates a `keel.toml` configuration from a workspace directory.
pub fn load_config(workspace_dir: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let path = workspace_dir.join(CONFIG_FILE);
    let content =
        std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
    load_config_from_str(&content)
}

/// Parses and validates a `keel.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<WorkspaceConfig, ConfigError> {
    let config: WorkspaceConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &WorkspaceConfig) -> Result<(), ConfigError> {
    let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
    if config.workspace.name.is_empty() {
        return invalid("workspace.name", "must not be empty");
    }
    if config.workspace.roots.is_empty() {
        return invalid("workspace.roots", "must list at least one directory");
    }
    if config.graph.builtin.is_empty() {
        return invalid("graph.builtin", "must not be empty");
    }
    Ok(())
}
