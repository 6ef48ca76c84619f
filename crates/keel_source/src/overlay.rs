//! Source providers: where file content comes from.
//!
//! [`OverlayFs`] layers in-memory buffers (unsaved editor content) over the
//! real filesystem. Reads always reflect the most recent overlay write for a
//! path; without an overlay, the on-disk bytes are returned.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Supplies the current text of a source file.
pub trait SourceProvider: Send + Sync {
    /// Returns the current content of the file at `path`.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Returns files that exist only in memory inside `dir`, so that directory
    /// listings can include files that have not been saved yet.
    fn virtual_files(&self, _dir: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Reads straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

impl SourceProvider for DiskFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// An overlay of in-memory buffers on top of the filesystem.
#[derive(Debug, Default)]
pub struct OverlayFs {
    overlay: RwLock<HashMap<PathBuf, String>>,
}

impl OverlayFs {
    /// Creates an overlay with no buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the in-memory content of `path`.
    pub fn set_overlay(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.overlay
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), content.into());
    }

    /// Drops the buffer for `path`, falling back to disk. Returns `true` if a
    /// buffer was present.
    pub fn clear_overlay(&self, path: &Path) -> bool {
        self.overlay
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }

    /// Returns `true` if `path` currently has an in-memory buffer.
    pub fn has_overlay(&self, path: &Path) -> bool {
        self.overlay
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

impl SourceProvider for OverlayFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        if let Some(content) = self
            .overlay
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(content.clone());
        }
        std::fs::read_to_string(path)
    }

    fn virtual_files(&self, dir: &Path) -> Vec<PathBuf> {
        let overlay = self.overlay.read().unwrap_or_else(PoisonError::into_inner);
        let mut files: Vec<PathBuf> = overlay
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect();
        files.sort();
        files
    }
}
