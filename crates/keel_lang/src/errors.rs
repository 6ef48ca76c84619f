//! Diagnostic codes reported by the frontend.

use keel_diagnostics::DiagnosticCode;

/// A character that cannot start a token.
pub const INVALID_TOKEN: DiagnosticCode = DiagnosticCode::new(100);
/// The parser found a token it did not expect.
pub const UNEXPECTED_TOKEN: DiagnosticCode = DiagnosticCode::new(101);
/// A literal that cannot be represented (unterminated string, integer overflow).
pub const MALFORMED_LITERAL: DiagnosticCode = DiagnosticCode::new(102);

/// A name declared twice in the same package or file scope.
pub const DUPLICATE_NAME: DiagnosticCode = DiagnosticCode::new(200);
/// A reference to an undeclared constant.
pub const UNKNOWN_NAME: DiagnosticCode = DiagnosticCode::new(201);
/// A qualifier that names no import of the file.
pub const UNKNOWN_PACKAGE: DiagnosticCode = DiagnosticCode::new(202);
/// Operand or declared types disagree.
pub const TYPE_MISMATCH: DiagnosticCode = DiagnosticCode::new(203);
/// A qualified reference to a member that is not `pub`.
pub const UNEXPORTED_MEMBER: DiagnosticCode = DiagnosticCode::new(204);
/// A qualified reference to a member the package does not declare.
pub const UNKNOWN_MEMBER: DiagnosticCode = DiagnosticCode::new(205);
/// A constant whose value cannot be computed (self reference, overflow).
pub const CONSTANT_EVALUATION: DiagnosticCode = DiagnosticCode::new(206);
