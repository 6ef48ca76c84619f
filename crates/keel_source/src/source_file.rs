//! Source file representation with line-start indexing for fast line/column lookup.

use crate::span::{FileId, Location};
use keel_common::ContentHash;
use std::path::PathBuf;

/// A source file loaded into the compilation session.
///
/// Stores the file's content along with precomputed line-start offsets and
/// the content hash used by change detection.
#[derive(Debug)]
pub struct SourceFile {
    /// The unique identifier for this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The filesystem path of this file (or a synthetic name for in-memory sources).
    pub path: PathBuf,
    /// The full text content of the file.
    pub content: String,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<u32>,
    /// Hash of the file content at load time.
    pub content_hash: ContentHash,
}

impl SourceFile {
    /// Creates a new `SourceFile` with precomputed line starts and content hash.
    pub fn new(id: FileId, path: PathBuf, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            path,
            content,
            line_starts,
            content_hash,
        }
    }

    /// The 1-based line and column of `byte_offset`.
    pub fn location(&self, byte_offset: u32) -> Location {
        let offset = byte_offset.min(self.content.len() as u32);
        let line_idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Location {
            path: self.path.clone(),
            line: line_idx as u32 + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// The full text of the line containing `byte_offset`, without its newline.
    pub fn line_text(&self, byte_offset: u32) -> &str {
        let offset = byte_offset.min(self.content.len() as u32);
        let line_idx = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line_idx] as usize;
        let end = self
            .line_starts
            .get(line_idx + 1)
            .map_or(self.content.len(), |next| *next as usize - 1);
        self.content[start..end].trim_end_matches('\r')
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}
