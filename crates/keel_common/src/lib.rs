//! Shared foundational types used across the keel incremental compiler.
//!
//! This crate provides the [`ImportPath`] key used to identify packages,
//! content hashing for change detection, and the internal-error result type.

#![warn(missing_docs)]

pub mod hash;
pub mod import_path;
pub mod result;

pub use hash::ContentHash;
pub use import_path::ImportPath;
pub use result::{InternalError, KeelResult};
