//! Central database of the source files currently referenced by the graph.

use crate::overlay::SourceProvider;
use crate::source_file::SourceFile;
use crate::span::{FileId, Location, Span};
use keel_common::ContentHash;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// The source database, owning loaded source text and resolving
/// [`FileId`] + byte offsets to line/column coordinates for diagnostics.
///
/// Every insertion has a matching eviction path. When the compilation graph
/// replaces a package it evicts the files of the previous version, and the
/// files of a failed build are kept only until that package is built again,
/// so their diagnostics can still be rendered. Ids are never reused. The
/// database is internally synchronized and shared between compile threads.
pub struct SourceDb {
    files: RwLock<HashMap<FileId, Arc<SourceFile>>>,
    next_id: AtomicU32,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Reads a file through `provider` and registers it under a fresh [`FileId`].
    pub fn load(&self, provider: &dyn SourceProvider, path: &Path) -> io::Result<Arc<SourceFile>> {
        let content = provider.read(path)?;
        Ok(self.add_source(path, content))
    }

    /// Like [`load`](Self::load), but hands back `previous` when it is the
    /// same path, still held, and its content is unchanged.
    pub fn reload(
        &self,
        provider: &dyn SourceProvider,
        path: &Path,
        previous: Option<&Arc<SourceFile>>,
    ) -> io::Result<Arc<SourceFile>> {
        let content = provider.read(path)?;
        if let Some(previous) = previous {
            if previous.path == path
                && previous.content_hash == ContentHash::from_bytes(content.as_bytes())
                && self.get_file(previous.id).is_some()
            {
                return Ok(Arc::clone(previous));
            }
        }
        Ok(self.add_source(path, content))
    }

    /// Adds a source file from an in-memory string.
    ///
    /// The `name` parameter is used as the file path in diagnostics.
    pub fn add_source(&self, name: impl Into<PathBuf>, content: String) -> Arc<SourceFile> {
        let id = FileId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let file = Arc::new(SourceFile::new(id, name.into(), content));
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&file));
        file
    }

    /// Returns the [`SourceFile`] for the given [`FileId`], or `None` if it
    /// was never loaded or has been evicted.
    pub fn get_file(&self, id: FileId) -> Option<Arc<SourceFile>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Removes the given files from the database. Returns how many were present.
    ///
    /// Outstanding `Arc<SourceFile>` handles stay valid; only the id lookup
    /// goes away.
    pub fn evict(&self, ids: impl IntoIterator<Item = FileId>) -> usize {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        ids.into_iter()
            .filter(|id| files.remove(id).is_some())
            .count()
    }

    /// Returns the number of files currently held.
    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no files are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where `span` starts, or `None` for dummy spans and spans into evicted files.
    pub fn locate(&self, span: Span) -> Option<Location> {
        Some(self.get_file(span.file)?.location(span.start))
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}
