//! Parsing and validation of `keel.toml` workspace configuration files.
//!
//! This crate reads the workspace configuration file and produces a
//! strongly-typed [`WorkspaceConfig`] holding the locator search roots, the
//! compilation-graph settings and the logging level.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
