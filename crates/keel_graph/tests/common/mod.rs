//! An in-memory language used to drive the graph in integration tests.
//!
//! Every package lives under `/mem/<name>/` and its files are overlay
//! buffers, so nothing touches the disk. Source files are line based:
//!
//! ```text
//! import <path>
//! value <text>
//! error <message>
//! ```
//!
//! Any other non-empty line is a syntax error.

#![allow(dead_code)]

use keel_common::ImportPath;
use keel_config::GraphConfig;
use keel_diagnostics::{Diagnostic, DiagnosticCode};
use keel_graph::{
    Analysis, Analyzer, CompilationGraph, GraphError, ImportResolver, IrBuilder, Language,
    LocateError, Locator, PackageDescriptor, PackageHandle, ParsedFile, Parser, Toolchain,
};
use keel_source::{OverlayFs, SourceDb, SourceFile, SourceProvider, Span};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

pub struct Mock;

impl Language for Mock {
    type Ast = Vec<Line>;
    type Semantic = MockType;
    type Info = MockInfo;
    type Ir = String;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Line {
    Import(String),
    Value(String),
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockType {
    pub path: String,
    pub handle: PackageHandle,
    pub value: String,
}

pub struct MockInfo {
    pub values: Vec<String>,
    pub imports: Vec<(String, MockType)>,
}

// ---------------------------------------------------------------------------
// Source provider that counts reads
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingFs {
    pub overlay: OverlayFs,
    pub reads: AtomicUsize,
}

impl SourceProvider for CountingFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.overlay.read(path)
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemLocator {
    packages: RwLock<BTreeMap<String, (Vec<PathBuf>, bool)>>,
    pub calls: AtomicUsize,
}

impl Locator for MemLocator {
    fn locate(
        &self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<PackageDescriptor, LocateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = import_path.as_str().trim_start_matches("./");
        let packages = self.packages.read().unwrap();
        let (files, native) = packages.get(name).ok_or_else(|| LocateError::NotFound {
            path: import_path.clone(),
            search_dir: search_dir.to_path_buf(),
        })?;
        Ok(PackageDescriptor {
            import_path: ImportPath::new(name),
            dir: package_dir(name),
            files: files.clone(),
            has_native_interop: *native,
        })
    }
}

pub fn package_dir(name: &str) -> PathBuf {
    PathBuf::from(format!("/mem/{name}"))
}

fn package_of(file: &Path) -> String {
    file.parent()
        .and_then(|dir| dir.strip_prefix("/mem").ok())
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Parser, analyzer and IR builder
// ---------------------------------------------------------------------------

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub struct MockLang {
    parses: Mutex<HashMap<String, usize>>,
    analyses: Mutex<HashMap<String, usize>>,
    builds: Mutex<HashMap<String, usize>>,
    hook: Mutex<Option<Hook>>,
    delay_ms: AtomicU64,
}

impl MockLang {
    pub fn parses(&self, package: &str) -> usize {
        self.parses.lock().unwrap().get(package).copied().unwrap_or(0)
    }

    pub fn analyses(&self, package: &str) -> usize {
        self.analyses.lock().unwrap().get(package).copied().unwrap_or(0)
    }

    pub fn builds(&self, package: &str) -> usize {
        self.builds.lock().unwrap().get(package).copied().unwrap_or(0)
    }

    pub fn total_parses(&self) -> usize {
        self.parses.lock().unwrap().values().sum()
    }

    /// Runs `hook` with the package path at the start of every analysis.
    pub fn set_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn clear_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }

    /// Makes every analysis sleep, widening the window for concurrent requests to overlap.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

fn bump(counter: &Mutex<HashMap<String, usize>>, key: &str) {
    *counter.lock().unwrap().entry(key.to_string()).or_default() += 1;
}

impl Parser<Mock> for MockLang {
    fn parse(&self, file: &SourceFile) -> Result<Vec<Line>, Vec<Diagnostic>> {
        bump(&self.parses, &package_of(&file.path));
        let mut lines = Vec::new();
        for line in file.content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let parsed = match line.split_once(' ') {
                Some(("import", rest)) => Line::Import(rest.to_string()),
                Some(("value", rest)) => Line::Value(rest.to_string()),
                Some(("error", rest)) => Line::Error(rest.to_string()),
                _ => {
                    return Err(vec![Diagnostic::error(
                        DiagnosticCode::new(100),
                        format!("syntax error: {line}"),
                        Span::new(file.id, 0, 0),
                    )])
                }
            };
            lines.push(parsed);
        }
        Ok(lines)
    }
}

impl Analyzer<Mock> for MockLang {
    fn analyze(
        &self,
        path: &ImportPath,
        handle: PackageHandle,
        files: &[ParsedFile<Mock>],
        resolver: &mut dyn ImportResolver<Mock>,
    ) -> Analysis<Mock> {
        bump(&self.analyses, path.as_str());
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(path.as_str());
        }
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let mut values = Vec::new();
        let mut imports = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for file in files {
            let dir = file.source.path.parent().unwrap_or(Path::new("/"));
            for line in &file.ast {
                match line {
                    Line::Import(target) => {
                        if seen.insert(target.clone()) {
                            if let Ok(resolved) = resolver.resolve(&ImportPath::new(target), dir) {
                                imports.push((resolved.path.to_string(), resolved.semantic));
                            }
                        }
                    }
                    Line::Value(value) => values.push(value.clone()),
                    Line::Error(message) => errors.push(Diagnostic::error(
                        DiagnosticCode::new(200),
                        message.clone(),
                        Span::new(file.source.id, 0, 0),
                    )),
                }
            }
        }
        Analysis {
            semantic: MockType {
                path: path.to_string(),
                handle,
                value: values.join(","),
            },
            info: MockInfo { values, imports },
            errors,
        }
    }

    fn builtin(&self, path: &ImportPath, handle: PackageHandle) -> MockType {
        MockType {
            path: path.to_string(),
            handle,
            value: "builtin".to_string(),
        }
    }
}

impl IrBuilder<Mock> for MockLang {
    fn build(&self, path: &ImportPath, info: &MockInfo) -> String {
        bump(&self.builds, path.as_str());
        let uses: Vec<String> = info
            .imports
            .iter()
            .map(|(dep, ty)| format!("{dep}={}", ty.value))
            .collect();
        format!("{} [{}]", info.values.join(","), uses.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

pub struct Workspace {
    pub fs: Arc<CountingFs>,
    pub locator: Arc<MemLocator>,
    pub lang: Arc<MockLang>,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(CountingFs::default()),
            locator: Arc::new(MemLocator::default()),
            lang: Arc::new(MockLang::default()),
        }
    }

    /// Creates (or replaces) package `name` with a single `main.mk` file.
    pub fn package(&self, name: &str, source: &str) -> PathBuf {
        let file = package_dir(name).join("main.mk");
        self.fs.overlay.set_overlay(&file, source);
        self.locator
            .packages
            .write()
            .unwrap()
            .insert(name.to_string(), (vec![file.clone()], false));
        file
    }

    /// Adds another file to an existing package.
    pub fn add_file(&self, name: &str, file_name: &str, source: &str) -> PathBuf {
        let file = package_dir(name).join(file_name);
        self.fs.overlay.set_overlay(&file, source);
        let mut packages = self.locator.packages.write().unwrap();
        let entry = packages.entry(name.to_string()).or_default();
        entry.0.push(file.clone());
        file
    }

    pub fn native_package(&self, name: &str) {
        let file = self.package(name, "value native");
        self.locator
            .packages
            .write()
            .unwrap()
            .insert(name.to_string(), (vec![file], true));
    }

    /// Rewrites the `main.mk` buffer of `name` without telling the graph.
    pub fn edit(&self, name: &str, source: &str) {
        self.fs
            .overlay
            .set_overlay(package_dir(name).join("main.mk"), source);
    }

    pub fn toolchain(&self) -> Toolchain<Mock> {
        Toolchain {
            locator: self.locator.clone(),
            source: self.fs.clone(),
            parser: self.lang.clone(),
            analyzer: self.lang.clone(),
            ir_builder: self.lang.clone(),
        }
    }

    pub fn graph(&self) -> CompilationGraph<Mock> {
        self.graph_with(GraphConfig::default())
    }

    pub fn graph_with(&self, config: GraphConfig) -> CompilationGraph<Mock> {
        CompilationGraph::new(self.toolchain(), Arc::new(SourceDb::new()), &config)
    }
}

pub fn paths(items: &[&str]) -> Vec<ImportPath> {
    items.iter().map(|p| ImportPath::new(p)).collect()
}

pub fn cycle_names(err: &GraphError) -> Vec<String> {
    match err {
        GraphError::ImportCycle { cycle } => cycle.iter().map(ToString::to_string).collect(),
        other => panic!("expected an import cycle, got {other:?}"),
    }
}

/// The messages of a type-error batch, in report order.
pub fn type_error_messages(err: &GraphError) -> Vec<String> {
    match err {
        GraphError::TypeErrors { diagnostics, .. } => {
            diagnostics.iter().map(|d| d.message.clone()).collect()
        }
        other => panic!("expected type errors, got {other:?}"),
    }
}
