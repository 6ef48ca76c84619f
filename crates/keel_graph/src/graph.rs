//! The compilation graph: package cache, dependency edges, dirty propagation,
//! and the import resolver the analyzer calls back into.

use crate::cancel::CancellationToken;
use crate::changes::ChangeSet;
use crate::error::GraphError;
use crate::flight::{BuildResult, ErrorBatch, FlightTable, LaneId, RequestId};
use crate::language::{ImportResolver, Language, PackageDescriptor, ParsedFile, ResolvedImport, Toolchain};
use crate::package::{CompiledPackage, Freshness, Package, PackageHandle};
use crate::snapshot::{GraphSnapshot, PackageSummary};
use keel_common::{ContentHash, ImportPath, InternalError};
use keel_config::GraphConfig;
use keel_diagnostics::{Diagnostic, DiagnosticSink};
use keel_source::{FileId, SourceDb, SourceFile};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// The search directory used for root requests and recompiles.
const ROOT_SEARCH_DIR: &str = ".";

/// The cache slot of one import path.
struct Entry<L: Language> {
    compiled: Arc<CompiledPackage<L>>,
    freshness: Freshness,
    reverse_dependencies: BTreeSet<ImportPath>,
    explicit: bool,
}

impl<L: Language> Entry<L> {
    fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    fn to_package(&self) -> Package<L> {
        Package::new(
            Arc::clone(&self.compiled),
            self.reverse_dependencies.clone(),
            !self.is_fresh(),
            self.explicit,
        )
    }
}

struct GraphState<L: Language> {
    entries: HashMap<ImportPath, Entry<L>>,
    /// Handles of Fresh packages only.
    handles: HashMap<PackageHandle, ImportPath>,
    /// Which cached package owns each source file.
    files: HashMap<PathBuf, ImportPath>,
    /// Files loaded by the last failed build of each path. Their diagnostics
    /// point into them, so they stay in the `SourceDb` until the path is
    /// built again.
    failed_files: HashMap<ImportPath, Vec<Arc<SourceFile>>>,
}

impl<L: Language> GraphState<L> {
    fn fresh(&self, path: &ImportPath) -> Option<Arc<CompiledPackage<L>>> {
        self.entries
            .get(path)
            .filter(|entry| entry.is_fresh())
            .map(|entry| Arc::clone(&entry.compiled))
    }

    /// Marks `start` and everything reachable through reverse edges Stale.
    ///
    /// Stops at packages that are already Stale; uncached paths are skipped.
    /// Returns the packages that changed state.
    fn invalidate(&mut self, start: &ImportPath, builtin: &ImportPath) -> Vec<ImportPath> {
        let mut dirtied = Vec::new();
        let mut pending = vec![start.clone()];
        while let Some(path) = pending.pop() {
            if path == *builtin {
                continue;
            }
            let Some(entry) = self.entries.get_mut(&path) else {
                continue;
            };
            if !entry.is_fresh() {
                continue;
            }
            entry.freshness = Freshness::Stale;
            let handle = entry.compiled.handle;
            pending.extend(entry.reverse_dependencies.iter().cloned());
            self.handles.remove(&handle);
            dirtied.push(path);
        }
        dirtied
    }

    /// Every path reachable from `start` through reverse edges, regardless of freshness.
    fn reverse_closure(&self, start: &ImportPath) -> HashSet<ImportPath> {
        let mut seen = HashSet::new();
        let mut pending = vec![start.clone()];
        while let Some(path) = pending.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(entry) = self.entries.get(&path) {
                pending.extend(entry.reverse_dependencies.iter().cloned());
            }
        }
        seen
    }
}

/// Per-request state shared by every lane of one root call.
struct Request {
    id: RequestId,
    token: CancellationToken,
    /// Type errors reported while serving the request.
    sink: DiagnosticSink,
    /// Packages whose type errors are already in `sink`.
    reported: Mutex<HashSet<ImportPath>>,
    failed: Mutex<HashMap<ImportPath, (GraphError, ErrorBatch)>>,
}

impl Request {
    fn failure(&self, path: &ImportPath) -> Option<GraphError> {
        self.lock_failed().get(path).map(|(err, _)| err.clone())
    }

    /// The type errors behind the failure of `path`, empty if it did not fail.
    fn failed_batch(&self, path: &ImportPath) -> ErrorBatch {
        self.lock_failed()
            .get(path)
            .map(|(_, batch)| batch.clone())
            .unwrap_or_default()
    }

    fn record_failure(&self, path: &ImportPath, err: &GraphError, batch: &ErrorBatch) {
        self.lock_failed()
            .insert(path.clone(), (err.clone(), batch.clone()));
    }

    /// Adds the type errors of `package` to the request's batch, once per package.
    fn report(&self, package: &ImportPath, diagnostics: &[Diagnostic]) {
        if diagnostics.is_empty() {
            return;
        }
        let first = self
            .reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package.clone());
        if first {
            self.sink.emit_all(diagnostics.iter().cloned());
        }
    }

    fn replay(&self, batch: &ErrorBatch) {
        for (package, diagnostics) in batch.iter() {
            self.report(package, diagnostics);
        }
    }

    fn lock_failed(&self) -> MutexGuard<'_, HashMap<ImportPath, (GraphError, ErrorBatch)>> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One synchronous call chain of a request.
#[derive(Clone, Copy)]
struct Lane<'r> {
    id: LaneId,
    request: &'r Request,
    depth: usize,
}

impl Lane<'_> {
    fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// The incremental compilation graph of one workspace.
///
/// All methods take `&self`; the graph is internally synchronized and may be
/// shared between threads.
pub struct CompilationGraph<L: Language> {
    toolchain: Toolchain<L>,
    source_db: Arc<SourceDb>,
    builtin: ImportPath,
    prune_reverse_edges: bool,
    pool: Option<rayon::ThreadPool>,
    state: RwLock<GraphState<L>>,
    // Lock order: `flights` before `state`.
    flights: Mutex<FlightTable<L>>,
    next_handle: AtomicU64,
    next_lane: AtomicU64,
    next_request: AtomicU64,
}

impl<L: Language> CompilationGraph<L> {
    /// Creates an empty graph.
    ///
    /// `config.jobs` other than `1` creates a worker pool used by
    /// [`compile_all`](Self::compile_all) and
    /// [`recompile_dirty`](Self::recompile_dirty).
    pub fn new(toolchain: Toolchain<L>, source_db: Arc<SourceDb>, config: &GraphConfig) -> Self {
        let pool = if config.jobs == 1 {
            None
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.jobs)
                .thread_name(|i| format!("keel-compile-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(%err, "cannot start worker pool, compiling sequentially");
                    None
                }
            }
        };
        Self {
            toolchain,
            source_db,
            builtin: ImportPath::new(&config.builtin),
            prune_reverse_edges: config.prune_reverse_edges,
            pool,
            state: RwLock::new(GraphState {
                entries: HashMap::new(),
                handles: HashMap::new(),
                files: HashMap::new(),
                failed_files: HashMap::new(),
            }),
            flights: Mutex::new(FlightTable::new()),
            next_handle: AtomicU64::new(1),
            next_lane: AtomicU64::new(1),
            next_request: AtomicU64::new(1),
        }
    }

    /// The source database holding the files of every cached package.
    pub fn source_db(&self) -> &Arc<SourceDb> {
        &self.source_db
    }

    /// The import path of the builtin sentinel package.
    pub fn builtin_path(&self) -> &ImportPath {
        &self.builtin
    }

    /// The number of cached packages, Fresh or Stale.
    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Returns `true` if nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a cached package without compiling anything.
    ///
    /// The result may be dirty; check [`Package::is_dirty`] before trusting
    /// its semantic info or IR.
    pub fn get(&self, path: &str) -> Option<Package<L>> {
        self.read_state().entries.get(path).map(Entry::to_package)
    }

    /// Resolves a handle handed out to the analyzer. Only Fresh packages are found.
    pub fn package_by_handle(&self, handle: PackageHandle) -> Option<Package<L>> {
        let state = self.read_state();
        let path = state.handles.get(&handle)?;
        state.entries.get(path).map(Entry::to_package)
    }

    /// Every cached package, sorted by import path.
    pub fn packages(&self) -> Vec<Package<L>> {
        let state = self.read_state();
        let mut packages: Vec<Package<L>> = state.entries.values().map(Entry::to_package).collect();
        packages.sort_by(|a, b| a.path.cmp(&b.path));
        packages
    }

    /// Every cached package a caller requested directly, sorted by import path.
    pub fn explicit_packages(&self) -> Vec<Package<L>> {
        self.packages()
            .into_iter()
            .filter(Package::is_explicit)
            .collect()
    }

    /// Compiles `path` and its transitive imports, serving Fresh packages from cache.
    ///
    /// On success the package is marked explicit. On failure the error of the
    /// failing stage is returned, unless type errors were reported anywhere
    /// during the request, in which case the whole batch is returned as
    /// [`GraphError::TypeErrors`].
    pub fn compile(&self, path: &str) -> Result<Package<L>, GraphError> {
        self.compile_with(path, CancellationToken::new())
    }

    /// Like [`compile`](Self::compile), but abandons the request once `token` is cancelled.
    pub fn compile_with(&self, path: &str, token: CancellationToken) -> Result<Package<L>, GraphError> {
        let request = self.new_request(token);
        let path = ImportPath::new(path);
        let result = self.resolve(self.new_lane(&request), &path, Path::new(ROOT_SEARCH_DIR));
        match result {
            Ok(compiled) => self.mark_explicit(compiled),
            Err(err) => Err(Self::root_error(&request, &path, err)),
        }
    }

    /// Compiles several roots, in parallel when the graph has a worker pool.
    ///
    /// Results are returned in the order of `paths`.
    pub fn compile_all(&self, paths: &[ImportPath]) -> Vec<Result<Package<L>, GraphError>> {
        self.run_parallel(paths, |path| self.compile(path.as_str()))
    }

    /// Marks `path` and every package that transitively imports it dirty.
    ///
    /// Called after an edit to one of the package's files. In-flight builds
    /// of any affected package are cancelled, so a compile that read the old
    /// text never publishes. Returns the packages that became dirty, sorted.
    pub fn mark_dirty_externally(&self, path: &str) -> Vec<ImportPath> {
        let path = ImportPath::new(path);
        if path == self.builtin {
            return Vec::new();
        }
        let mut dirtied = {
            let flights = self.lock_flights();
            let mut state = self.write_state();
            let dirtied = state.invalidate(&path, &self.builtin);
            let affected = state.reverse_closure(&path);
            let tokens = flights.tokens_where(|p| affected.contains(p));
            if !tokens.is_empty() {
                debug!(%path, builds = tokens.len(), "cancelling in-flight compiles");
            }
            for token in tokens {
                token.cancel();
            }
            dirtied
        };
        dirtied.sort();
        info!(%path, dirtied = dirtied.len(), "marked dirty");
        dirtied
    }

    /// Marks the package owning `file` dirty. Returns the owner, if any.
    pub fn invalidate_file(&self, file: &Path) -> Option<ImportPath> {
        let owner = self.read_state().files.get(file).cloned()?;
        self.mark_dirty_externally(owner.as_str());
        Some(owner)
    }

    /// Re-reads every cached source file and dirties the packages whose files
    /// were added, modified or deleted since they were parsed.
    pub fn refresh(&self) -> ChangeSet {
        let cached: Vec<Arc<CompiledPackage<L>>> = self
            .read_state()
            .entries
            .values()
            .filter(|entry| !entry.compiled.is_builtin())
            .map(|entry| Arc::clone(&entry.compiled))
            .collect();

        let mut changes = ChangeSet::default();
        for compiled in cached {
            let listed: Option<BTreeSet<PathBuf>> = self
                .toolchain
                .locator
                .locate(&compiled.path, Path::new(ROOT_SEARCH_DIR))
                .ok()
                .map(|descriptor| descriptor.files.into_iter().collect());

            let mut changed = false;
            for file in &compiled.files {
                let path = &file.source.path;
                let still_listed = listed.as_ref().is_some_and(|l| l.contains(path));
                match self.toolchain.source.read(path) {
                    Ok(content) if still_listed => {
                        if ContentHash::from_bytes(content.as_bytes()) == file.source.content_hash {
                            changes.unchanged_files.push(path.clone());
                        } else {
                            changes.modified_files.push(path.clone());
                            changed = true;
                        }
                    }
                    _ => {
                        changes.deleted_files.push(path.clone());
                        changed = true;
                    }
                }
            }
            for path in listed.into_iter().flatten() {
                if !compiled.files.iter().any(|f| f.source.path == path) {
                    changes.new_files.push(path);
                    changed = true;
                }
            }

            if changed {
                changes
                    .dirtied
                    .extend(self.mark_dirty_externally(compiled.path.as_str()));
            }
        }
        changes.sort();
        changes
    }

    /// Recompiles every dirty package in dependency order.
    ///
    /// A package is rebuilt only if it is still dirty when its turn comes.
    /// Independent packages are rebuilt in parallel when the graph has a
    /// worker pool. Returns the first failure; on success no package is dirty.
    pub fn recompile_dirty(&self) -> Result<(), GraphError> {
        loop {
            let layers = self.dirty_layers();
            if layers.is_empty() {
                return Ok(());
            }
            info!(
                packages = layers.iter().map(Vec::len).sum::<usize>(),
                layers = layers.len(),
                "recompiling dirty packages"
            );
            let request = self.new_request(CancellationToken::new());
            for layer in &layers {
                let results = self.run_parallel(layer, |path| {
                    self.acquire(self.new_lane(&request), path, None)
                });
                let failure = layer
                    .iter()
                    .zip(results)
                    .find_map(|(path, result)| result.err().map(|err| (path, err)));
                if let Some((path, err)) = failure {
                    return Err(Self::root_error(&request, path, err));
                }
            }
        }
    }

    /// A serializable view of every cached package and its edges.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.read_state();
        let mut packages: Vec<PackageSummary> = state
            .entries
            .values()
            .map(|entry| PackageSummary {
                path: entry.compiled.path.clone(),
                handle: entry.compiled.handle.as_raw(),
                dirty: !entry.is_fresh(),
                explicit: entry.explicit,
                builtin: entry.compiled.is_builtin(),
                dependencies: entry.compiled.dependencies.iter().cloned().collect(),
                reverse_dependencies: entry.reverse_dependencies.iter().cloned().collect(),
                files: entry
                    .compiled
                    .files
                    .iter()
                    .map(|f| f.source.path.clone())
                    .collect(),
            })
            .collect();
        packages.sort_by(|a, b| a.path.cmp(&b.path));
        GraphSnapshot { packages }
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolves an import seen from `search_dir`, compiling it if needed.
    fn resolve(&self, lane: Lane<'_>, import_path: &ImportPath, search_dir: &Path) -> BuildResult<L> {
        match self.locate_import(import_path, search_dir)? {
            Some(descriptor) => {
                let path = descriptor.import_path.clone();
                self.acquire(lane, &path, Some(descriptor))
            }
            None => Ok(self.builtin_package()),
        }
    }

    /// Finds the package behind an import; `None` is the builtin sentinel.
    fn locate_import(
        &self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<Option<PackageDescriptor>, GraphError> {
        if *import_path == self.builtin {
            return Ok(None);
        }
        let descriptor = self.toolchain.locator.locate(import_path, search_dir)?;
        if descriptor.import_path == self.builtin {
            return Ok(None);
        }
        Ok(Some(descriptor))
    }

    /// Returns the Fresh package for `path`, joining or starting its build.
    fn acquire(
        &self,
        lane: Lane<'_>,
        path: &ImportPath,
        mut descriptor: Option<PackageDescriptor>,
    ) -> BuildResult<L> {
        let request = lane.request;
        loop {
            let mut flights = self.lock_flights();
            if let Some(compiled) = self.read_state().fresh(path) {
                debug!(%path, "cache hit");
                return Ok(compiled);
            }
            if let Some(err) = request.failure(path) {
                return Err(err);
            }

            if let Some(flight) = flights.get(path) {
                if let Some(cycle) = flights.find_cycle(lane.id, path) {
                    return Err(GraphError::ImportCycle { cycle });
                }
                flights.begin_wait(lane.id, path);
                drop(flights);
                debug!(%path, owner = flight.owner, "waiting on in-flight compile");
                let (result, batch) = flight.wait();
                self.lock_flights().end_wait(lane.id);

                if let Err(err) = &result {
                    let foreign = flight.request != request.id;
                    if foreign
                        && matches!(err, GraphError::Cancelled { .. })
                        && !request.token.is_cancelled()
                    {
                        // Another request gave up; build it for this one.
                        continue;
                    }
                    // Only a foreign owner's errors need replaying. A lane of
                    // this request reported into the shared sink already.
                    if foreign {
                        request.replay(&batch);
                    }
                    request.record_failure(path, err, &batch);
                }
                return result;
            }

            let flight = flights.start(lane.id, request.id, request.token.clone(), path);
            drop(flights);
            debug!(%path, "cache miss");
            let mut batch = ErrorBatch::default();
            let result = self.build(lane, path, descriptor.take(), &mut batch);
            if let Err(err) = &result {
                request.record_failure(path, err, &batch);
            }
            self.lock_flights().finish(lane.id, path);
            flight.complete(result.clone(), batch);
            return result;
        }
    }

    fn builtin_package(&self) -> Arc<CompiledPackage<L>> {
        if let Some(entry) = self.read_state().entries.get(&self.builtin) {
            return Arc::clone(&entry.compiled);
        }
        let mut state = self.write_state();
        if let Some(entry) = state.entries.get(&self.builtin) {
            return Arc::clone(&entry.compiled);
        }
        let handle = self.allocate_handle();
        let compiled = Arc::new(CompiledPackage {
            path: self.builtin.clone(),
            handle,
            descriptor: None,
            files: Vec::new(),
            semantic: self.toolchain.analyzer.builtin(&self.builtin, handle),
            info: None,
            ir: None,
            dependencies: BTreeSet::new(),
        });
        state.handles.insert(handle, self.builtin.clone());
        state.entries.insert(
            self.builtin.clone(),
            Entry {
                compiled: Arc::clone(&compiled),
                freshness: Freshness::Fresh,
                reverse_dependencies: BTreeSet::new(),
                explicit: false,
            },
        );
        compiled
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Builds `path`, collecting the type errors behind a failure into `batch`.
    fn build(
        &self,
        lane: Lane<'_>,
        path: &ImportPath,
        descriptor: Option<PackageDescriptor>,
        batch: &mut ErrorBatch,
    ) -> BuildResult<L> {
        info!(path = %path, depth = lane.depth, "compiling");
        let mut loaded = Vec::new();
        let result = self.build_package(lane, path, descriptor, &mut loaded, batch);
        let loaded_ids: HashSet<FileId> = loaded.iter().map(|file| file.id).collect();
        let superseded = {
            let mut state = self.write_state();
            match &result {
                Ok(_) => state.failed_files.remove(path),
                Err(err) => {
                    debug!(%path, %err, "compile failed");
                    state.invalidate(path, &self.builtin);
                    state.failed_files.insert(path.clone(), loaded)
                }
            }
        };
        self.source_db.evict(
            superseded
                .into_iter()
                .flatten()
                .map(|file| file.id)
                .filter(|id| !loaded_ids.contains(id)),
        );
        result
    }

    fn build_package(
        &self,
        lane: Lane<'_>,
        path: &ImportPath,
        descriptor: Option<PackageDescriptor>,
        loaded: &mut Vec<Arc<SourceFile>>,
        batch: &mut ErrorBatch,
    ) -> BuildResult<L> {
        let descriptor = match descriptor {
            Some(descriptor) => descriptor,
            None => self
                .toolchain
                .locator
                .locate(path, Path::new(ROOT_SEARCH_DIR))?,
        };
        if descriptor.has_native_interop {
            return Err(GraphError::UnsupportedFeature {
                path: path.clone(),
                feature: "native interop sources".to_string(),
            });
        }

        // Readers must not trust the previous version while this one is built.
        self.write_state().invalidate(path, &self.builtin);

        Self::check_cancelled(lane, path)?;
        let previous = self
            .read_state()
            .failed_files
            .get(path)
            .cloned()
            .unwrap_or_default();
        let mut files = Vec::with_capacity(descriptor.files.len());
        for file in &descriptor.files {
            let earlier = previous.iter().find(|source| source.path == *file);
            let source = self
                .source_db
                .reload(self.toolchain.source.as_ref(), file, earlier)
                .map_err(|source| GraphError::Read {
                    path: path.clone(),
                    file: file.clone(),
                    source: Arc::new(source),
                })?;
            loaded.push(Arc::clone(&source));
            let ast = self
                .toolchain
                .parser
                .parse(&source)
                .map_err(|diagnostics| GraphError::Parse {
                    path: path.clone(),
                    diagnostics,
                })?;
            files.push(ParsedFile { source, ast });
        }

        Self::check_cancelled(lane, path)?;
        let handle = self.allocate_handle();
        let mut resolver = PackageResolver {
            graph: self,
            lane: lane.nested(),
            imports: BTreeMap::new(),
            fatal: None,
            failed: ErrorBatch::default(),
        };
        let analysis = self
            .toolchain
            .analyzer
            .analyze(path, handle, &files, &mut resolver);
        let PackageResolver {
            imports,
            fatal,
            failed,
            ..
        } = resolver;

        batch.extend(&failed);
        batch.add(path, &analysis.errors);
        lane.request.report(path, &analysis.errors);
        if let Some(err) = fatal {
            return Err(err);
        }
        if !analysis.errors.is_empty() {
            return Err(GraphError::TypeErrors {
                package: path.clone(),
                diagnostics: analysis.errors,
            });
        }

        Self::check_cancelled(lane, path)?;
        let ir = self.toolchain.ir_builder.build(path, &analysis.info);

        let compiled = Arc::new(CompiledPackage {
            path: path.clone(),
            handle,
            descriptor: Some(descriptor),
            files,
            semantic: analysis.semantic,
            info: Some(analysis.info),
            ir: Some(ir),
            dependencies: imports.keys().cloned().collect(),
        });
        self.publish(lane, &compiled, &imports)?;
        Ok(compiled)
    }

    /// Swaps `compiled` into the cache together with its edges and indexes.
    fn publish(
        &self,
        lane: Lane<'_>,
        compiled: &Arc<CompiledPackage<L>>,
        imports: &BTreeMap<ImportPath, PackageHandle>,
    ) -> Result<(), GraphError> {
        let path = &compiled.path;
        let mut evicted = Vec::new();
        {
            let mut state = self.write_state();
            Self::check_cancelled(lane, path)?;
            for (dep, handle) in imports {
                let current = state
                    .entries
                    .get(dep)
                    .filter(|entry| entry.is_fresh())
                    .map(|entry| entry.compiled.handle);
                if current != Some(*handle) {
                    debug!(%path, dependency = %dep, "dependency changed during compile");
                    return Err(GraphError::Cancelled { path: path.clone() });
                }
            }

            let mut reverse_dependencies = BTreeSet::new();
            let mut explicit = false;
            if let Some(previous) = state.entries.remove(path) {
                reverse_dependencies = previous.reverse_dependencies;
                explicit = previous.explicit;
                let old = previous.compiled;
                state.handles.remove(&old.handle);
                for file in &old.files {
                    if state.files.get(&file.source.path) == Some(path) {
                        state.files.remove(&file.source.path);
                    }
                    evicted.push(file.source.id);
                }
                if self.prune_reverse_edges {
                    for dep in old.dependencies.difference(&compiled.dependencies) {
                        if let Some(entry) = state.entries.get_mut(dep) {
                            entry.reverse_dependencies.remove(path);
                        }
                    }
                }
            }

            for dep in &compiled.dependencies {
                if let Some(entry) = state.entries.get_mut(dep) {
                    entry.reverse_dependencies.insert(path.clone());
                }
            }
            state.handles.insert(compiled.handle, path.clone());
            for file in &compiled.files {
                state.files.insert(file.source.path.clone(), path.clone());
            }
            state.entries.insert(
                path.clone(),
                Entry {
                    compiled: Arc::clone(compiled),
                    freshness: Freshness::Fresh,
                    reverse_dependencies,
                    explicit,
                },
            );
        }
        self.source_db.evict(evicted);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn mark_explicit(&self, compiled: Arc<CompiledPackage<L>>) -> Result<Package<L>, GraphError> {
        let mut state = self.write_state();
        let Some(entry) = state.entries.get_mut(&compiled.path) else {
            return Err(InternalError::new(format!(
                "compiled package {} is missing from the cache",
                compiled.path
            ))
            .into());
        };
        entry.explicit = true;
        let current = Arc::ptr_eq(&entry.compiled, &compiled) && entry.is_fresh();
        Ok(Package::new(
            compiled,
            entry.reverse_dependencies.clone(),
            !current,
            true,
        ))
    }

    /// Type errors reported during the request take precedence over the stage error.
    fn root_error(request: &Request, path: &ImportPath, err: GraphError) -> GraphError {
        if request.sink.has_errors() {
            GraphError::TypeErrors {
                package: path.clone(),
                diagnostics: request.sink.take_all(),
            }
        } else {
            err
        }
    }

    /// Stale packages grouped into layers; each layer depends only on earlier ones.
    fn dirty_layers(&self) -> Vec<Vec<ImportPath>> {
        let state = self.read_state();
        let mut stale: Vec<&ImportPath> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh())
            .map(|(path, _)| path)
            .collect();
        stale.sort();

        let mut graph: DiGraph<ImportPath, ()> = DiGraph::new();
        let nodes: HashMap<&ImportPath, NodeIndex> = stale
            .iter()
            .map(|path| (*path, graph.add_node((*path).clone())))
            .collect();
        for path in &stale {
            let to = nodes[*path];
            for dep in &state.entries[*path].compiled.dependencies {
                if let Some(&from) = nodes.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let Ok(order) = toposort(&graph, None) else {
            return stale.into_iter().map(|path| vec![path.clone()]).collect();
        };
        let mut layer_of: HashMap<NodeIndex, usize> = HashMap::new();
        let mut layers: Vec<Vec<ImportPath>> = Vec::new();
        for node in order {
            let layer = graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|dep| layer_of.get(&dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            layer_of.insert(node, layer);
            if layers.len() <= layer {
                layers.resize_with(layer + 1, Vec::new);
            }
            layers[layer].push(graph[node].clone());
        }
        for layer in &mut layers {
            layer.sort();
        }
        layers
    }

    fn run_parallel<T: Send>(
        &self,
        paths: &[ImportPath],
        f: impl Fn(&ImportPath) -> T + Sync + Send,
    ) -> Vec<T> {
        match &self.pool {
            Some(pool) if paths.len() > 1 => pool.install(|| paths.par_iter().map(&f).collect()),
            _ => paths.iter().map(f).collect(),
        }
    }

    fn check_cancelled(lane: Lane<'_>, path: &ImportPath) -> Result<(), GraphError> {
        if lane.request.token.is_cancelled() {
            return Err(GraphError::Cancelled { path: path.clone() });
        }
        Ok(())
    }

    fn new_request(&self, token: CancellationToken) -> Request {
        Request {
            id: self.next_request.fetch_add(1, Ordering::Relaxed),
            token,
            sink: DiagnosticSink::new(),
            reported: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashMap::new()),
        }
    }

    fn new_lane<'r>(&self, request: &'r Request) -> Lane<'r> {
        Lane {
            id: self.next_lane.fetch_add(1, Ordering::Relaxed),
            request,
            depth: 0,
        }
    }

    fn allocate_handle(&self) -> PackageHandle {
        PackageHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, GraphState<L>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GraphState<L>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_flights(&self) -> MutexGuard<'_, FlightTable<L>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The resolver handed to the analyzer while one package is being built.
///
/// Records the resolved imports, which become the package's dependency
/// edges, and remembers the first failure so that it is reported instead of
/// the analyzer's follow-on errors. The type errors behind failed imports
/// are gathered into `failed`.
struct PackageResolver<'g, 'r, L: Language> {
    graph: &'g CompilationGraph<L>,
    lane: Lane<'r>,
    imports: BTreeMap<ImportPath, PackageHandle>,
    fatal: Option<GraphError>,
    failed: ErrorBatch,
}

impl<L: Language> ImportResolver<L> for PackageResolver<'_, '_, L> {
    fn resolve(
        &mut self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<ResolvedImport<L>, GraphError> {
        let result = match self.graph.locate_import(import_path, search_dir) {
            Ok(Some(descriptor)) => {
                let path = descriptor.import_path.clone();
                let result = self.graph.acquire(self.lane, &path, Some(descriptor));
                if result.is_err() {
                    self.failed.extend(&self.lane.request.failed_batch(&path));
                }
                result
            }
            Ok(None) => Ok(self.graph.builtin_package()),
            Err(err) => Err(err),
        };
        let result = result.and_then(|compiled| {
            if compiled.is_builtin() {
                return Ok(compiled);
            }
            match self.imports.insert(compiled.path.clone(), compiled.handle) {
                Some(earlier) if earlier != compiled.handle => Err(GraphError::Cancelled {
                    path: compiled.path.clone(),
                }),
                _ => Ok(compiled),
            }
        });
        match result {
            Ok(compiled) => Ok(ResolvedImport {
                path: compiled.path.clone(),
                handle: compiled.handle,
                semantic: compiled.semantic.clone(),
            }),
            Err(err) => {
                if self.fatal.is_none() {
                    self.fatal = Some(err.clone());
                }
                Err(err)
            }
        }
    }
}
