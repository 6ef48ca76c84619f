//! Diagnostics: construction, per-request accumulation, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] errors with codes and
//! source labels. The thread-safe [`DiagnosticSink`] accumulates diagnostics
//! across a whole compile request, and [`TerminalRenderer`] formats them for
//! humans.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod label;
pub mod renderer;
pub mod sink;

pub use code::DiagnosticCode;
pub use diagnostic::Diagnostic;
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use sink::DiagnosticSink;
