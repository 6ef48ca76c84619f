//! Diagnostic rendering for terminal output.

use crate::diagnostic::Diagnostic;
use crate::label::LabelStyle;
use keel_source::{SourceDb, Span};

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// error[E203]: mismatched types in `+`
///   --> src/app/main.kl:3:15
///    |
///  3 | const X: int = 1 + true
///    |                ^^^^^^^^ expected int, found bool
/// ```
///
/// Secondary labels get a `:::` block of their own. Spans into files the
/// [`SourceDb`] no longer holds are skipped.
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[1;31m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.paint(&format!("error[{}]", diag.code)),
            diag.message
        );

        let primary_msg = diag
            .labels
            .iter()
            .find(|l| l.style == LabelStyle::Primary)
            .map_or("", |l| l.message.as_str());
        snippet(&mut out, source_db, "-->", diag.primary_span, primary_msg);
        for label in diag.labels.iter().filter(|l| l.style == LabelStyle::Secondary) {
            snippet(&mut out, source_db, ":::", label.span, &label.message);
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

/// Appends the location line, the source line and an underline for `span`.
fn snippet(out: &mut String, source_db: &SourceDb, arrow: &str, span: Span, message: &str) {
    let Some(file) = source_db.get_file(span.file) else {
        return;
    };
    let location = file.location(span.start);
    let line_num = location.line.to_string();
    let padding = " ".repeat(line_num.len());
    let col_padding = " ".repeat(location.column as usize - 1);
    let carets = "^".repeat(span.len().max(1) as usize);
    let message = if message.is_empty() {
        String::new()
    } else {
        format!(" {message}")
    };

    out.push_str(&format!("{padding}{arrow} {location}\n"));
    out.push_str(&format!("{padding} |\n"));
    out.push_str(&format!("{line_num} | {}\n", file.line_text(span.start)));
    out.push_str(&format!("{padding} | {col_padding}{carets}{message}\n"));
}
