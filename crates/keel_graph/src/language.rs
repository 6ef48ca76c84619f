//! Contracts between the compilation graph and the language it compiles.
//!
//! The graph is generic over a [`Language`], which names the artifact types,
//! and is driven by a [`Toolchain`] bundling the five collaborators: the
//! package [`Locator`], the [`SourceProvider`], the [`Parser`], the
//! [`Analyzer`] and the [`IrBuilder`].

use crate::error::{GraphError, LocateError};
use crate::package::PackageHandle;
use keel_common::ImportPath;
use keel_diagnostics::Diagnostic;
use keel_source::{SourceFile, SourceProvider};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The artifact types of a compiled language.
pub trait Language: Send + Sync + 'static {
    /// The syntax tree of one source file.
    type Ast: Send + Sync + 'static;
    /// The type of a package as seen by its importers.
    type Semantic: Clone + Send + Sync + 'static;
    /// Everything the analyzer learned about a package.
    type Info: Send + Sync + 'static;
    /// The lowered form built from [`Info`](Language::Info).
    type Ir: Send + Sync + 'static;
}

/// Where a package lives and what it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// The canonical import path; the key the package is cached under.
    pub import_path: ImportPath,
    /// The package directory.
    pub dir: PathBuf,
    /// The package's source files, in a stable order.
    pub files: Vec<PathBuf>,
    /// Whether the directory holds native-interop sources.
    pub has_native_interop: bool,
}

/// Turns an import path into a [`PackageDescriptor`].
pub trait Locator: Send + Sync {
    /// Locates `import_path` as seen from a package in `search_dir`.
    ///
    /// Root requests use `"."` as the search directory.
    fn locate(
        &self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<PackageDescriptor, LocateError>;
}

/// A source file together with its syntax tree.
pub struct ParsedFile<L: Language> {
    /// The source text, registered in the graph's `SourceDb`.
    pub source: Arc<SourceFile>,
    /// The parsed syntax tree.
    pub ast: L::Ast,
}

/// Parses one source file.
pub trait Parser<L: Language>: Send + Sync {
    /// Parses `file`, or returns the diagnostics explaining why it is malformed.
    fn parse(&self, file: &SourceFile) -> Result<L::Ast, Vec<Diagnostic>>;
}

/// The outcome of analyzing one package.
pub struct Analysis<L: Language> {
    /// The package type handed to importers.
    pub semantic: L::Semantic,
    /// The information the IR builder consumes.
    pub info: L::Info,
    /// Type errors; a non-empty list means no IR is built.
    pub errors: Vec<Diagnostic>,
}

/// A successfully resolved import.
pub struct ResolvedImport<L: Language> {
    /// The canonical import path of the dependency.
    pub path: ImportPath,
    /// The handle of the dependency version that was resolved.
    pub handle: PackageHandle,
    /// The dependency's semantic type.
    pub semantic: L::Semantic,
}

/// The callback the analyzer uses to pull in imported packages.
///
/// Implemented by the compilation graph; resolving an import may compile it.
pub trait ImportResolver<L: Language> {
    /// Resolves `import_path` relative to the importing package's `search_dir`.
    fn resolve(
        &mut self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<ResolvedImport<L>, GraphError>;
}

/// The semantic analyzer.
pub trait Analyzer<L: Language>: Send + Sync {
    /// Analyzes the files of the package `path`.
    ///
    /// `handle` identifies the version being built. The analyzer calls
    /// `resolver` once per distinct import. When the resolver fails, the
    /// graph reports that failure itself, so the analyzer only needs to avoid
    /// cascading errors about the missing package.
    fn analyze(
        &self,
        path: &ImportPath,
        handle: PackageHandle,
        files: &[ParsedFile<L>],
        resolver: &mut dyn ImportResolver<L>,
    ) -> Analysis<L>;

    /// Returns the semantic type of the builtin sentinel package.
    fn builtin(&self, path: &ImportPath, handle: PackageHandle) -> L::Semantic;
}

/// Lowers analyzed packages.
pub trait IrBuilder<L: Language>: Send + Sync {
    /// Builds the IR of `path` from its analysis.
    fn build(&self, path: &ImportPath, info: &L::Info) -> L::Ir;
}

/// The collaborators that drive a [`CompilationGraph`](crate::CompilationGraph).
pub struct Toolchain<L: Language> {
    /// Maps import paths to package directories.
    pub locator: Arc<dyn Locator>,
    /// Supplies file content, overlays first.
    pub source: Arc<dyn SourceProvider>,
    /// Parses source files.
    pub parser: Arc<dyn Parser<L>>,
    /// Type-checks packages.
    pub analyzer: Arc<dyn Analyzer<L>>,
    /// Builds IR for packages that type-checked.
    pub ir_builder: Arc<dyn IrBuilder<L>>,
}

impl<L: Language> Clone for Toolchain<L> {
    fn clone(&self) -> Self {
        Self {
            locator: Arc::clone(&self.locator),
            source: Arc::clone(&self.source),
            parser: Arc::clone(&self.parser),
            analyzer: Arc::clone(&self.analyzer),
            ir_builder: Arc::clone(&self.ir_builder),
        }
    }
}
