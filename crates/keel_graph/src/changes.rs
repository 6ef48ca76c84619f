//! Detection of source edits made behind the graph's back.

use keel_common::ImportPath;
use serde::Serialize;
use std::path::PathBuf;

/// The result of [`CompilationGraph::refresh`](crate::CompilationGraph::refresh).
///
/// Files are categorized as new (listed by the locator but not part of the
/// cached package), modified (content hash changed since parsing), deleted
/// (no longer readable or no longer listed), or unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    /// Files that appeared in a cached package's directory.
    pub new_files: Vec<PathBuf>,
    /// Files whose content hash differs from the one recorded at parse time.
    pub modified_files: Vec<PathBuf>,
    /// Files that can no longer be read or are no longer part of their package.
    pub deleted_files: Vec<PathBuf>,
    /// Files whose content hash matches.
    pub unchanged_files: Vec<PathBuf>,
    /// Every package that became dirty, sorted.
    pub dirtied: Vec<ImportPath>,
}

impl ChangeSet {
    /// Returns `true` if no file was added, modified or deleted.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// Returns the number of added, modified and deleted files.
    pub fn changed_count(&self) -> usize {
        self.new_files.len() + self.modified_files.len() + self.deleted_files.len()
    }

    pub(crate) fn sort(&mut self) {
        self.new_files.sort();
        self.modified_files.sort();
        self.deleted_files.sort();
        self.unchanged_files.sort();
        self.dirtied.sort();
        self.dirtied.dedup();
    }
}
