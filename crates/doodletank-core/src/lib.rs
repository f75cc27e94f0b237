//! Doodletank Core
//!
//! Core types shared across Doodletank components.
//!
//! This crate provides:
//! - Error types and result handling
//! - The RGBA [`ImageSurface`] handed over by the drawing surface
//! - The fixed-shape model input [`InputTensor`]
//! - The [`ClassificationResult`] returned to the UI

pub mod error;
pub mod surface;
pub mod types;

pub use error::{Error, Result};
pub use surface::{ContentBounds, ImageSurface};
pub use types::{ClassificationResult, InputTensor, INPUT_CHANNELS, INPUT_LEN, INPUT_SIZE};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::surface::ImageSurface;
    pub use crate::types::{ClassificationResult, InputTensor};
}
