//! A serializable view of the dependency graph.

use keel_common::ImportPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Every cached package and its edges, sorted by import path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// The cached packages.
    pub packages: Vec<PackageSummary>,
}

/// One cached package in a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSummary {
    /// The canonical import path.
    pub path: ImportPath,
    /// The handle of the cached version.
    pub handle: u64,
    /// Whether the package must be recompiled before use.
    pub dirty: bool,
    /// Whether a caller requested the package directly.
    pub explicit: bool,
    /// Whether this is the builtin sentinel.
    pub builtin: bool,
    /// Direct imports.
    pub dependencies: Vec<ImportPath>,
    /// Direct importers.
    pub reverse_dependencies: Vec<ImportPath>,
    /// Source files of the cached version.
    pub files: Vec<PathBuf>,
}

impl GraphSnapshot {
    /// Looks up a package by import path.
    pub fn package(&self, path: &str) -> Option<&PackageSummary> {
        self.packages.iter().find(|p| p.path.as_str() == path)
    }
}

impl fmt::Display for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pkg in &self.packages {
            let mut flags = Vec::new();
            if pkg.dirty {
                flags.push("dirty");
            }
            if pkg.explicit {
                flags.push("explicit");
            }
            if pkg.builtin {
                flags.push("builtin");
            }
            write!(f, "{}", pkg.path)?;
            if !flags.is_empty() {
                write!(f, " [{}]", flags.join(", "))?;
            }
            writeln!(f)?;
            for dep in &pkg.dependencies {
                writeln!(f, "  -> {dep}")?;
            }
        }
        Ok(())
    }
}
