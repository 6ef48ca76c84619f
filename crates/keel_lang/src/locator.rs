//! Maps import paths to package directories under the workspace roots.
//!
//! A package is a directory holding at least one `.kl` file. Its canonical
//! import path is the directory's path relative to the root that contains
//! it, with `/` separators. Relative imports (`./x`, `../x`) resolve against
//! the importing package's directory and are canonicalized the same way.

use keel_common::ImportPath;
use keel_graph::{LocateError, Locator, PackageDescriptor};
use keel_source::SourceProvider;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extension of keel source files.
pub const SOURCE_EXTENSION: &str = "kl";

/// Extension of native-interop sources, which the graph refuses to compile.
pub const NATIVE_EXTENSION: &str = "c";

/// Locates packages on disk, including files that only exist as overlays.
pub struct DirLocator {
    roots: Vec<PathBuf>,
    source: Arc<dyn SourceProvider>,
}

impl DirLocator {
    /// Creates a locator searching `roots` in order.
    pub fn new(roots: Vec<PathBuf>, source: Arc<dyn SourceProvider>) -> Self {
        let roots = roots.iter().map(|r| normalize(r)).collect();
        Self { roots, source }
    }

    /// Returns the search roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Lists every package under the roots, sorted by import path.
    ///
    /// When two roots hold the same import path, the first root wins, as it
    /// does for [`Locator::locate`].
    pub fn discover(&self) -> io::Result<Vec<ImportPath>> {
        let mut found = Vec::new();
        for root in &self.roots {
            if root.is_dir() {
                self.walk(root, root, &mut found)?;
            }
        }
        found.sort();
        found.dedup();
        Ok(found)
    }

    fn walk(&self, root: &Path, dir: &Path, found: &mut Vec<ImportPath>) -> io::Result<()> {
        if dir != root && self.list(dir)?.is_some_and(|(files, _)| !files.is_empty()) {
            if let Some(path) = import_path_of(root, dir) {
                found.push(path);
            }
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.walk(root, &path, found)?;
            }
        }
        Ok(())
    }

    /// Lists the source files of `dir` and whether it holds native sources.
    ///
    /// Returns `None` when the directory neither exists nor has overlay files.
    fn list(&self, dir: &Path) -> io::Result<Option<(Vec<PathBuf>, bool)>> {
        let overlays = self.source.virtual_files(dir);
        let mut entries = Vec::new();
        if dir.is_dir() {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() {
                    entries.push(path);
                }
            }
        } else if overlays.is_empty() {
            return Ok(None);
        }
        entries.extend(overlays);

        let native = entries.iter().any(|p| has_extension(p, NATIVE_EXTENSION));
        let mut files: Vec<PathBuf> = entries
            .into_iter()
            .filter(|p| has_extension(p, SOURCE_EXTENSION))
            .collect();
        files.sort();
        files.dedup();
        Ok(Some((files, native)))
    }

    fn candidates(&self, import_path: &ImportPath, search_dir: &Path) -> Result<Vec<PathBuf>, LocateError> {
        let raw = import_path.as_str();
        let invalid = |reason: &str| LocateError::InvalidPath {
            path: import_path.clone(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("import path is empty"));
        }
        if raw.starts_with('/') || raw.contains('\\') {
            return Err(invalid("import paths are `/`-separated and relative to a root"));
        }
        if import_path.is_relative() && search_dir != Path::new(".") {
            return Ok(vec![normalize(&search_dir.join(raw))]);
        }
        if !import_path.is_relative() && raw.split('/').any(|s| s == "." || s == "..") {
            return Err(invalid("only relative imports may contain `.` or `..`"));
        }
        Ok(self.roots.iter().map(|root| normalize(&root.join(raw))).collect())
    }
}

impl Locator for DirLocator {
    fn locate(
        &self,
        import_path: &ImportPath,
        search_dir: &Path,
    ) -> Result<PackageDescriptor, LocateError> {
        for dir in self.candidates(import_path, search_dir)? {
            let Some(root) = self.roots.iter().find(|root| dir.starts_with(root)) else {
                return Err(LocateError::InvalidPath {
                    path: import_path.clone(),
                    reason: "resolves outside every package root".to_string(),
                });
            };
            let Some(canonical) = import_path_of(root, &dir) else {
                return Err(LocateError::InvalidPath {
                    path: import_path.clone(),
                    reason: "a package root is not itself a package".to_string(),
                });
            };
            let listing = self.list(&dir).map_err(|source| LocateError::Io {
                dir: dir.clone(),
                source: Arc::new(source),
            })?;
            let Some((files, has_native_interop)) = listing else {
                continue;
            };
            if files.is_empty() && !has_native_interop {
                continue;
            }
            debug!(%import_path, %canonical, dir = %dir.display(), "located package");
            return Ok(PackageDescriptor {
                import_path: canonical,
                dir,
                files,
                has_native_interop,
            });
        }
        Err(LocateError::NotFound {
            path: import_path.clone(),
            search_dir: search_dir.to_path_buf(),
        })
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// The canonical import path of `dir` under `root`, or `None` for the root itself.
fn import_path_of(root: &Path, dir: &Path) -> Option<ImportPath> {
    let rel = dir.strip_prefix(root).ok()?;
    let segments: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(ImportPath::new(segments.join("/")))
    }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_source::{DiskFs, OverlayFs};
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn locator(root: &Path) -> DirLocator {
        DirLocator::new(vec![root.to_path_buf()], Arc::new(DiskFs))
    }

    #[test]
    fn locates_nested_package() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("net/http/b.kl"));
        touch(&src.join("net/http/a.kl"));
        touch(&src.join("net/http/README.md"));

        let desc = locator(&src)
            .locate(&ImportPath::new("net/http"), Path::new("."))
            .unwrap();
        assert_eq!(desc.import_path.as_str(), "net/http");
        assert_eq!(desc.dir, src.join("net/http"));
        assert_eq!(
            desc.files,
            vec![src.join("net/http/a.kl"), src.join("net/http/b.kl")]
        );
        assert!(!desc.has_native_interop);
    }

    #[test]
    fn relative_imports_are_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("app/main.kl"));
        touch(&src.join("lib/util/u.kl"));

        let loc = locator(&src);
        let desc = loc
            .locate(&ImportPath::new("../lib/./util"), &src.join("app"))
            .unwrap();
        assert_eq!(desc.import_path.as_str(), "lib/util");

        let desc = loc.locate(&ImportPath::new("./app"), Path::new(".")).unwrap();
        assert_eq!(desc.import_path.as_str(), "app");
    }

    #[test]
    fn detects_native_interop() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("ffi/bind.kl"));
        touch(&src.join("ffi/shim.c"));

        let desc = locator(&src)
            .locate(&ImportPath::new("ffi"), Path::new("."))
            .unwrap();
        assert!(desc.has_native_interop);
        assert_eq!(desc.files, vec![src.join("ffi/bind.kl")]);
    }

    #[test]
    fn missing_and_invalid_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("empty/notes.txt"));
        touch(&src.join("app/main.kl"));
        let loc = locator(&src);

        let err = loc.locate(&ImportPath::new("nope"), Path::new(".")).unwrap_err();
        assert!(matches!(err, LocateError::NotFound { .. }));
        let err = loc.locate(&ImportPath::new("empty"), Path::new(".")).unwrap_err();
        assert!(matches!(err, LocateError::NotFound { .. }));
        for bad in ["", "/abs", "a/../b"] {
            let err = loc.locate(&ImportPath::new(bad), Path::new(".")).unwrap_err();
            assert!(matches!(err, LocateError::InvalidPath { .. }), "{bad}");
        }
        let err = loc
            .locate(&ImportPath::new("../../outside"), &src.join("app"))
            .unwrap_err();
        assert!(matches!(err, LocateError::InvalidPath { .. }));
    }

    #[test]
    fn first_root_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        touch(&first.join("lib/a.kl"));
        touch(&second.join("lib/b.kl"));
        touch(&second.join("only/c.kl"));

        let loc = DirLocator::new(vec![first.clone(), second.clone()], Arc::new(DiskFs));
        let lib = loc.locate(&ImportPath::new("lib"), Path::new(".")).unwrap();
        assert_eq!(lib.dir, first.join("lib"));
        let only = loc.locate(&ImportPath::new("only"), Path::new(".")).unwrap();
        assert_eq!(only.dir, second.join("only"));
    }

    #[test]
    fn overlay_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("app/main.kl"));
        let fs = Arc::new(OverlayFs::new());
        fs.set_overlay(src.join("app/unsaved.kl"), "const x: int = 1");
        fs.set_overlay(src.join("draft/new.kl"), "const y: int = 2");

        let loc = DirLocator::new(vec![src.clone()], fs);
        let app = loc.locate(&ImportPath::new("app"), Path::new(".")).unwrap();
        assert_eq!(app.files, vec![src.join("app/main.kl"), src.join("app/unsaved.kl")]);
        let draft = loc.locate(&ImportPath::new("draft"), Path::new(".")).unwrap();
        assert_eq!(draft.files, vec![src.join("draft/new.kl")]);
    }

    #[test]
    fn discovers_packages() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("app/main.kl"));
        touch(&src.join("net/http/h.kl"));
        touch(&src.join("net/readme.txt"));
        touch(&src.join("top.kl"));

        let found = locator(&src).discover().unwrap();
        let names: Vec<&str> = found.iter().map(ImportPath::as_str).collect();
        assert_eq!(names, vec!["app", "net/http"]);
    }
}
