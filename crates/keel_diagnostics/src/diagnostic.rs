//! Error diagnostics with codes, labels, notes and help lines.

use crate::code::DiagnosticCode;
use crate::label::Label;
use keel_source::Span;
use serde::{Deserialize, Serialize};

/// One problem found in the source, pointing at where it was found.
///
/// Parse errors and type errors are both reported as diagnostics; the
/// compilation graph carries them inside its error values so that a caller
/// receives the whole batch at once. Every diagnostic is an error: keel
/// refuses to build a package that has any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What kind of problem this is.
    pub code: DiagnosticCode,
    /// The one-line summary.
    pub message: String,
    /// Where the problem was detected.
    pub primary_span: Span,
    /// Further annotated spans, such as an earlier declaration.
    pub labels: Vec<Label>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Suggestions for fixing the problem.
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with no labels, notes or help.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            primary_span: span,
            labels: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a label.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help line.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}
