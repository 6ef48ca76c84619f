//! The incremental compilation graph.
//!
//! [`CompilationGraph`] caches one compiled [`Package`] per import path,
//! records symmetric dependency / reverse-dependency edges between them, and
//! propagates staleness along the reverse edges when a package is edited. The
//! graph is itself the [`ImportResolver`] handed to the semantic analyzer, so
//! resolving an import and populating the cache are the same operation.
//!
//! The parser, analyzer, IR builder, package locator and source provider are
//! external collaborators supplied through a [`Toolchain`]. The graph never
//! looks inside their outputs beyond what the [`Language`] trait exposes.
//!
//! Concurrent requests share work: at most one build per import path is in
//! flight at a time, and every other request that needs the same path waits
//! for that build and shares its result. Import cycles are rejected with
//! [`GraphError::ImportCycle`], including cycles that span two requests.

#![warn(missing_docs)]

pub mod cancel;
pub mod changes;
pub mod error;
mod flight;
pub mod graph;
pub mod language;
pub mod package;
pub mod snapshot;

pub use cancel::CancellationToken;
pub use changes::ChangeSet;
pub use error::{GraphError, LocateError};
pub use graph::CompilationGraph;
pub use language::{
    Analysis, Analyzer, ImportResolver, IrBuilder, Language, Locator, PackageDescriptor,
    ParsedFile, Parser, ResolvedImport, Toolchain,
};
pub use package::{CompiledPackage, Freshness, Package, PackageHandle};
pub use snapshot::{GraphSnapshot, PackageSummary};
