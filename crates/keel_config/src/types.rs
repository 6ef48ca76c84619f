//! Configuration types deserialized from `keel.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The top-level workspace configuration parsed from `keel.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Workspace metadata and package search roots.
    pub workspace: WorkspaceMeta,
    /// Compilation-graph settings.
    #[serde(default)]
    pub graph: GraphConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// The `[workspace]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceMeta {
    /// The workspace name.
    pub name: String,
    /// Directories searched for packages, relative to the workspace root.
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

/// The `[graph]` table controlling the compilation graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Import path of the builtin sentinel package, which is never read from disk.
    pub builtin: String,
    /// Worker threads for parallel compiles. `0` means one per CPU, `1` is sequential.
    pub jobs: usize,
    /// Drop reverse edges to dependencies a package no longer imports.
    pub prune_reverse_edges: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            builtin: "unsafe".to_string(),
            jobs: 1,
            prune_reverse_edges: true,
        }
    }
}

/// The `[log]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level when neither `RUST_LOG` nor a CLI flag overrides it.
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

/// A logging verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational events, including one per compiled package.
    Info,
    /// Cache hits and misses.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// Returns the filter directive understood by `tracing-subscriber`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
