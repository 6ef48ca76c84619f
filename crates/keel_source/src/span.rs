//! File ids, byte spans and the line/column locations they resolve to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifies one load of a source file in a [`SourceDb`](crate::SourceDb).
///
/// Reloading the same path after an edit yields a new id, and ids are never
/// reused, so a span into an evicted version cannot resolve into its
/// replacement.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u32);

impl FileId {
    /// The file of synthetic spans.
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Wraps a raw id.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// A half-open byte range `start..end` in one loaded file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Span {
    /// The file the offsets point into.
    pub file: FileId,
    /// First byte.
    pub start: u32,
    /// One past the last byte.
    pub end: u32,
}

impl Span {
    /// A span with no source location.
    pub const DUMMY: Span = Span {
        file: FileId::DUMMY,
        start: 0,
        end: 0,
    };

    /// Creates a span in `file`.
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// Spans of different files do not combine; `self` is returned unchanged.
    pub fn cover(self, other: Span) -> Span {
        if self.file != other.file {
            return self;
        }
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns `true` for spans created from [`Span::DUMMY`].
    pub fn is_dummy(&self) -> bool {
        self.file == FileId::DUMMY
    }
}

/// The start of a span as a user sees it: `path:line:column`, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// The file path as the package's locator listed it.
    pub path: PathBuf,
    /// Line number.
    pub line: u32,
    /// Column number, counted in bytes.
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}
