//! A small package language used to drive the compilation graph end to end.
//!
//! Packages are directories of `.kl` files under the workspace roots. A file
//! holds imports and typed constants:
//!
//! ```text
//! import "net/http"
//! pub const port: int = http.default_port + 1
//! ```
//!
//! This crate supplies every collaborator a
//! [`CompilationGraph`](keel_graph::CompilationGraph) needs: the
//! [`DirLocator`], the parser, the analyzer and the IR builder, bundled by
//! [`toolchain`].

#![warn(missing_docs)]

pub mod analyzer;
pub mod ast;
pub mod errors;
pub mod ir;
pub mod lexer;
pub mod locator;
pub mod parser;
pub mod token;

pub use analyzer::{PackageInfo, PackageType};
pub use ast::SourceAst;
pub use ir::PackageIr;
pub use locator::DirLocator;

use keel_common::ImportPath;
use keel_config::WorkspaceConfig;
use keel_diagnostics::Diagnostic;
use keel_graph::{
    Analysis, Analyzer, ImportResolver, IrBuilder, Language, PackageHandle, ParsedFile, Parser,
    Toolchain,
};
use keel_source::{SourceFile, SourceProvider};
use std::path::Path;
use std::sync::Arc;

/// The keel language.
#[derive(Debug, Clone, Copy)]
pub struct KeelLang;

impl Language for KeelLang {
    type Ast = SourceAst;
    type Semantic = PackageType;
    type Info = PackageInfo;
    type Ir = PackageIr;
}

/// Parser, analyzer and IR builder for [`KeelLang`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Frontend;

impl Parser<KeelLang> for Frontend {
    fn parse(&self, file: &SourceFile) -> Result<SourceAst, Vec<Diagnostic>> {
        parser::parse_file(file)
    }
}

impl Analyzer<KeelLang> for Frontend {
    fn analyze(
        &self,
        path: &ImportPath,
        handle: PackageHandle,
        files: &[ParsedFile<KeelLang>],
        resolver: &mut dyn ImportResolver<KeelLang>,
    ) -> Analysis<KeelLang> {
        analyzer::analyze_package(path, handle, files, resolver)
    }

    fn builtin(&self, path: &ImportPath, handle: PackageHandle) -> PackageType {
        analyzer::builtin_type(path, handle)
    }
}

impl IrBuilder<KeelLang> for Frontend {
    fn build(&self, path: &ImportPath, info: &PackageInfo) -> PackageIr {
        ir::lower(path, info)
    }
}

/// Creates a locator over the roots of `config`, resolved against `workspace_root`.
pub fn workspace_locator(
    config: &WorkspaceConfig,
    workspace_root: &Path,
    source: Arc<dyn SourceProvider>,
) -> DirLocator {
    let roots = config
        .workspace
        .roots
        .iter()
        .map(|root| workspace_root.join(root))
        .collect();
    DirLocator::new(roots, source)
}

/// Bundles `locator` and `source` with the keel frontend.
pub fn toolchain(locator: Arc<DirLocator>, source: Arc<dyn SourceProvider>) -> Toolchain<KeelLang> {
    Toolchain {
        locator,
        source,
        parser: Arc::new(Frontend),
        analyzer: Arc::new(Frontend),
        ir_builder: Arc::new(Frontend),
    }
}
