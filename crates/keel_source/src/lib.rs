//! Source file management, span tracking, and the overlay-aware source provider.
//!
//! This crate provides the [`SourceDb`] holding the text of every file the
//! compilation graph has parsed, [`FileId`] and [`Span`] for pointing into
//! it, [`Location`] for showing a span as `path:line:column`, and
//! [`OverlayFs`], a [`SourceProvider`] that prefers unsaved editor buffers
//! over on-disk content.

#![warn(missing_docs)]

pub mod overlay;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use overlay::{DiskFs, OverlayFs, SourceProvider};
pub use source_db::SourceDb;
pub use source_file::SourceFile;
pub use span::{FileId, Location, Span};
