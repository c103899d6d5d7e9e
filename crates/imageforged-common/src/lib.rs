//! Imageforged-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across imageforged:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for queued entries and batches
//! - **Core Types**: Output formats, accepted input MIME types, byte formatting
//! - **Path Utilities**: Functions to detect image files and hidden entries
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use imageforged_common::{EntryId, ImageFormat, Error, Result};
//! use imageforged_common::paths::{has_extension, image_extensions};
//! use std::path::Path;
//!
//! // Entry ids are derived from the source path
//! let id = EntryId::from_path(Path::new("/photos/a.jpg"));
//! assert_eq!(id, EntryId::from_path(Path::new("/photos/a.jpg")));
//!
//! // Output formats know their extension and MIME type
//! assert_eq!(ImageFormat::WebP.extension(), "webp");
//!
//! // Check file types
//! assert!(has_extension(Path::new("photo.png"), image_extensions()));
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::busy("converting"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
