//! Compiled packages and their cache bookkeeping.

use crate::language::{Language, PackageDescriptor, ParsedFile};
use keel_common::ImportPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Identifies one compiled version of a package.
///
/// Every successful (re)compile allocates a new handle, so a handle held by
/// an importer names exactly the version it was type-checked against.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PackageHandle(u64);

impl PackageHandle {
    /// Creates a handle from a raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a cached package may be trusted.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Freshness {
    /// Semantic info and IR reflect the current sources of the package and its dependencies.
    Fresh,
    /// The package or one of its dependencies changed; it must be recompiled before use.
    Stale,
}

/// The immutable result of one successful compile.
pub struct CompiledPackage<L: Language> {
    /// The canonical import path.
    pub path: ImportPath,
    /// The handle of this version.
    pub handle: PackageHandle,
    /// Where the package was found. `None` for the builtin sentinel.
    pub descriptor: Option<PackageDescriptor>,
    /// The parsed source files.
    pub files: Vec<ParsedFile<L>>,
    /// The type importers see.
    pub semantic: L::Semantic,
    /// The analysis result. `None` for the builtin sentinel.
    pub info: Option<L::Info>,
    /// The lowered package. `None` for the builtin sentinel.
    pub ir: Option<L::Ir>,
    /// The packages this one imports, excluding the builtin sentinel.
    pub dependencies: BTreeSet<ImportPath>,
}

impl<L: Language> CompiledPackage<L> {
    /// Returns `true` for the builtin sentinel package.
    pub fn is_builtin(&self) -> bool {
        self.descriptor.is_none()
    }
}

impl<L: Language> fmt::Debug for CompiledPackage<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPackage")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("files", &self.files.len())
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// A consumer's view of a cached package.
///
/// Combines the shared compiled artifact with the cache bookkeeping read at
/// the moment the snapshot was taken. Dereferences to [`CompiledPackage`].
pub struct Package<L: Language> {
    compiled: Arc<CompiledPackage<L>>,
    reverse_dependencies: BTreeSet<ImportPath>,
    dirty: bool,
    explicit: bool,
}

impl<L: Language> Package<L> {
    pub(crate) fn new(
        compiled: Arc<CompiledPackage<L>>,
        reverse_dependencies: BTreeSet<ImportPath>,
        dirty: bool,
        explicit: bool,
    ) -> Self {
        Self {
            compiled,
            reverse_dependencies,
            dirty,
            explicit,
        }
    }

    /// Returns the shared compiled artifact.
    pub fn compiled(&self) -> &Arc<CompiledPackage<L>> {
        &self.compiled
    }

    /// The packages that import this one.
    pub fn reverse_dependencies(&self) -> &BTreeSet<ImportPath> {
        &self.reverse_dependencies
    }

    /// Whether the package was stale when the snapshot was taken.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a caller requested this package directly.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }
}

impl<L: Language> Deref for Package<L> {
    type Target = CompiledPackage<L>;

    fn deref(&self) -> &CompiledPackage<L> {
        &self.compiled
    }
}

impl<L: Language> Clone for Package<L> {
    fn clone(&self) -> Self {
        Self {
            compiled: Arc::clone(&self.compiled),
            reverse_dependencies: self.reverse_dependencies.clone(),
            dirty: self.dirty,
            explicit: self.explicit,
        }
    }
}

impl<L: Language> fmt::Debug for Package<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.compiled.path)
            .field("handle", &self.compiled.handle)
            .field("dependencies", &self.compiled.dependencies)
            .field("reverse_dependencies", &self.reverse_dependencies)
            .field("dirty", &self.dirty)
            .field("explicit", &self.explicit)
            .finish()
    }
}
