//! Singleflight bookkeeping: one in-flight build per import path.
//!
//! Every build is owned by a *lane*, one synchronous call chain of a request.
//! A lane that needs a path already being built by another lane waits on that
//! build instead of starting its own. Before waiting, the wait-for chain is
//! walked (owner of the path, the path that owner waits on, its owner, ...);
//! if it leads back to the waiting lane, the imports form a cycle and waiting
//! would deadlock, so the caller reports the cycle instead.

use crate::cancel::CancellationToken;
use crate::error::GraphError;
use crate::language::Language;
use crate::package::CompiledPackage;
use keel_common::ImportPath;
use keel_diagnostics::Diagnostic;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

pub(crate) type LaneId = u64;
pub(crate) type RequestId = u64;
pub(crate) type BuildResult<L> = Result<Arc<CompiledPackage<L>>, GraphError>;

/// The type errors of every package whose analysis failed during one build,
/// that package's own and those of dependencies built along the way, in the
/// order they were reported. Each package appears at most once.
#[derive(Clone, Debug, Default)]
pub(crate) struct ErrorBatch {
    reports: Vec<(ImportPath, Vec<Diagnostic>)>,
}

impl ErrorBatch {
    pub fn add(&mut self, package: &ImportPath, diagnostics: &[Diagnostic]) {
        if diagnostics.is_empty() || self.reports.iter().any(|(p, _)| p == package) {
            return;
        }
        self.reports.push((package.clone(), diagnostics.to_vec()));
    }

    pub fn extend(&mut self, other: &ErrorBatch) {
        for (package, diagnostics) in &other.reports {
            self.add(package, diagnostics);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImportPath, &[Diagnostic])> {
        self.reports.iter().map(|(p, d)| (p, d.as_slice()))
    }
}

/// One in-flight build, shared by its owner and every waiter.
pub(crate) struct Flight<L: Language> {
    pub owner: LaneId,
    pub request: RequestId,
    pub token: CancellationToken,
    slot: Mutex<Option<(BuildResult<L>, ErrorBatch)>>,
    done: Condvar,
}

impl<L: Language> Flight<L> {
    fn new(owner: LaneId, request: RequestId, token: CancellationToken) -> Self {
        Self {
            owner,
            request,
            token,
            slot: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Blocks until the owner completes the build.
    pub fn wait(&self) -> (BuildResult<L>, ErrorBatch) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Stores the outcome and wakes every waiter.
    pub fn complete(&self, result: BuildResult<L>, batch: ErrorBatch) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some((result, batch));
        self.done.notify_all();
    }
}

/// The table of in-flight builds and of which lane waits on what.
pub(crate) struct FlightTable<L: Language> {
    flights: HashMap<ImportPath, Arc<Flight<L>>>,
    /// The paths each lane currently owns, outermost first.
    stacks: HashMap<LaneId, Vec<ImportPath>>,
    /// The path each blocked lane is waiting on.
    waiting: HashMap<LaneId, ImportPath>,
}

impl<L: Language> FlightTable<L> {
    pub fn new() -> Self {
        Self {
            flights: HashMap::new(),
            stacks: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    pub fn get(&self, path: &ImportPath) -> Option<Arc<Flight<L>>> {
        self.flights.get(path).cloned()
    }

    /// Registers a build of `path` owned by `lane`.
    pub fn start(
        &mut self,
        lane: LaneId,
        request: RequestId,
        token: CancellationToken,
        path: &ImportPath,
    ) -> Arc<Flight<L>> {
        let flight = Arc::new(Flight::new(lane, request, token));
        self.flights.insert(path.clone(), Arc::clone(&flight));
        self.stacks.entry(lane).or_default().push(path.clone());
        flight
    }

    /// Removes the build of `path` once its owner is done with it.
    pub fn finish(&mut self, lane: LaneId, path: &ImportPath) {
        self.flights.remove(path);
        if let Some(stack) = self.stacks.get_mut(&lane) {
            if stack.last() == Some(path) {
                stack.pop();
            }
            if stack.is_empty() {
                self.stacks.remove(&lane);
            }
        }
    }

    pub fn begin_wait(&mut self, lane: LaneId, path: &ImportPath) {
        self.waiting.insert(lane, path.clone());
    }

    pub fn end_wait(&mut self, lane: LaneId) {
        self.waiting.remove(&lane);
    }

    /// Returns the import cycle `lane` would close by waiting on `path`.
    ///
    /// The cycle starts and ends with `path`.
    pub fn find_cycle(&self, lane: LaneId, path: &ImportPath) -> Option<Vec<ImportPath>> {
        let mut cycle = Vec::new();
        let mut target = path.clone();
        // Every lane appears at most once on a chain that does not reach `lane`.
        for _ in 0..=self.stacks.len() {
            let owner = self.flights.get(&target)?.owner;
            let stack = self.stacks.get(&owner)?;
            let start = stack.iter().position(|p| *p == target)?;
            cycle.extend(stack[start..].iter().cloned());
            if owner == lane {
                cycle.push(path.clone());
                return Some(cycle);
            }
            target = self.waiting.get(&owner)?.clone();
        }
        None
    }

    /// Tokens of every in-flight build whose path satisfies `affected`.
    pub fn tokens_where(&self, affected: impl Fn(&ImportPath) -> bool) -> Vec<CancellationToken> {
        self.flights
            .iter()
            .filter(|(path, _)| affected(path))
            .map(|(_, flight)| flight.token.clone())
            .collect()
    }
}
