//! Imageforged - batch image conversion orchestrator
//!
//! Queue image files and directories, convert them in bulk to WebP or AVIF,
//! recover from partial engine failures, and undo the last conversion.
//!
//! This library crate exposes the core functionality for the CLI and for
//! integration testing.

pub mod config;
pub mod conversion;
pub mod inspect;
pub mod options;
pub mod orchestrator;
pub mod scanner;
pub mod settings;
pub mod state;

pub use orchestrator::Orchestrator;
