//! Batch image conversion.
//!
//! This module handles turning standby entries into WebP or AVIF files:
//!
//! - The [`ConversionEngine`] trait and its request/response types
//! - [`ImageEngine`], the default engine built on the `image` crate
//! - [`ConversionDispatcher`], which runs a batch, tracks its progress and
//!   reconciles partial failures

mod engine;
mod executor;
mod manager;

pub use engine::{
    find_existing_outputs, BatchItem, BatchRequest, ConversionEngine, ConvertedFile, EngineEvent,
};
pub use executor::{ImageEngine, ImageEngineSettings};
pub use manager::{
    ConversionDispatcher, ConversionOutcome, OutcomeStatus, DEFAULT_SETTLE_DELAY,
    EMPTY_RESULT_MESSAGE,
};
