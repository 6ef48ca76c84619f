//! Labels that annotate source spans within a diagnostic.

use keel_source::Span;
use serde::{Deserialize, Serialize};

/// The visual style of a diagnostic label.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LabelStyle {
    /// The primary label highlighting the main error location.
    Primary,
    /// A secondary label providing additional context.
    Secondary,
}

/// An annotated source span within a diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// The source span this label annotates.
    pub span: Span,
    /// The message displayed next to the underline.
    pub message: String,
    /// Whether this is a primary or secondary label.
    pub style: LabelStyle,
}

impl Label {
    /// Creates a primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    /// Creates a secondary label.
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}
