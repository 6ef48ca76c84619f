//! Error types for package location and compilation.

use keel_common::{ImportPath, InternalError};
use keel_diagnostics::Diagnostic;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Errors reported by a [`Locator`](crate::Locator).
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocateError {
    /// No package directory matches the import path.
    #[error("cannot find package {path:?} (searched from {})", .search_dir.display())]
    NotFound {
        /// The import path that was requested.
        path: ImportPath,
        /// The directory the search started from.
        search_dir: PathBuf,
    },

    /// The import path is syntactically unusable.
    #[error("invalid import path {path:?}: {reason}")]
    InvalidPath {
        /// The offending import path.
        path: ImportPath,
        /// Why the path was rejected.
        reason: String,
    },

    /// The package directory exists but could not be listed.
    #[error("failed to list package directory {}: {source}", .dir.display())]
    Io {
        /// The package directory.
        dir: PathBuf,
        /// The underlying I/O error.
        source: Arc<io::Error>,
    },
}

/// Errors returned by compilation-graph operations.
///
/// Values are `Clone` because one build result is shared by every request
/// waiting on that build.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// The import path could not be resolved to a package.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The package uses a feature the graph cannot compile.
    #[error("package {path:?} uses an unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The package import path.
        path: ImportPath,
        /// A description of the feature.
        feature: String,
    },

    /// A source file of the package could not be read.
    #[error("failed to read {} in package {path:?}: {source}", .file.display())]
    Read {
        /// The package import path.
        path: ImportPath,
        /// The file that could not be read.
        file: PathBuf,
        /// The underlying I/O error.
        source: Arc<io::Error>,
    },

    /// A source file of the package is malformed.
    #[error("failed to parse package {path:?}: {} error(s)", .diagnostics.len())]
    Parse {
        /// The package import path.
        path: ImportPath,
        /// The parser's diagnostics.
        diagnostics: Vec<Diagnostic>,
    },

    /// The semantic analyzer reported errors.
    ///
    /// At the root of a request this carries every type error reported while
    /// serving the request, not only those of `package`.
    #[error("type checking {package:?} failed: {} error(s)", .diagnostics.len())]
    TypeErrors {
        /// The package the batch is reported for.
        package: ImportPath,
        /// The accumulated type errors.
        diagnostics: Vec<Diagnostic>,
    },

    /// The import graph contains a cycle.
    #[error("import cycle: {}", join_cycle(.cycle))]
    ImportCycle {
        /// The paths along the cycle, with the first path repeated at the end.
        cycle: Vec<ImportPath>,
    },

    /// The request was cancelled, or a dependency changed while the package was being built.
    #[error("compilation of {path:?} was cancelled")]
    Cancelled {
        /// The package whose build was abandoned.
        path: ImportPath,
    },

    /// An internal invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl GraphError {
    /// Returns the diagnostics carried by this error, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            GraphError::Parse { diagnostics, .. } | GraphError::TypeErrors { diagnostics, .. } => {
                diagnostics
            }
            _ => &[],
        }
    }
}

fn join_cycle(cycle: &[ImportPath]) -> String {
    cycle
        .iter()
        .map(ImportPath::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
