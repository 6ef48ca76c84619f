//! Thread-safe diagnostic accumulator shared by every lane of a compile request.

use crate::diagnostic::Diagnostic;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Collects the diagnostics reported while serving one compile request.
///
/// Several threads may emit into the same sink; each batch passed to
/// [`emit_all`](Self::emit_all) stays contiguous.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }

    /// Emits a batch of diagnostics, preserving their order.
    pub fn emit_all(&self, diags: impl IntoIterator<Item = Diagnostic>) {
        self.lock().extend(diags);
    }

    /// Returns `true` if anything has been emitted and not yet taken.
    pub fn has_errors(&self) -> bool {
        !self.lock().is_empty()
    }

    /// The number of diagnostics held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
