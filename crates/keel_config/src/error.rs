//! Errors from loading `keel.toml`.

use std::path::PathBuf;

/// Why a workspace configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the configuration schema.
    #[error("invalid keel.toml: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field parsed but holds a value keel cannot use.
    #[error("`{field}` {reason}")]
    Invalid {
        /// Dotted path of the offending field, such as `graph.builtin`.
        field: &'static str,
        /// What is wrong with its value.
        reason: &'static str,
    },
}
