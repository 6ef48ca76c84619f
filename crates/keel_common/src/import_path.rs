//! The identity key of a package in the compilation graph.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// The path other packages use to import a package (e.g. `"net/http"`).
///
/// Backed by an `Arc<str>` so that the many copies held in dependency sets,
/// reverse-dependency sets, and indexes share one allocation per clone.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportPath(Arc<str>);

impl ImportPath {
    /// Creates an import path from any string-like value.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for paths resolved relative to the importing package
    /// (`./x`, `../x`, or `.` itself).
    pub fn is_relative(&self) -> bool {
        let s = self.as_str();
        s == "." || s == ".." || s.starts_with("./") || s.starts_with("../")
    }
}

impl fmt::Display for ImportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ImportPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl Borrow<str> for ImportPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ImportPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImportPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImportPath {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Serialize for ImportPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ImportPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(ImportPath::from)
    }
}
