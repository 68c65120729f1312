//! # Glyph Common Library
//!
//! Shared code for the glyph inference service and its model backends:
//! - Backend kinds and their label maps
//! - Image artifact codec (pixel vector <-> 28x28 grayscale PNG)
//! - Per-backend preprocessing (direct and canonical-glyph)
//! - Configuration loading and root folder resolution
//! - Common error type

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod labels;
pub mod preprocess;

pub use backend::BackendKind;
pub use error::{Error, Result};
pub use preprocess::{ModelInput, Preprocessor};

/// Side length of every glyph grid handled by the service
pub const GRID_SIZE: u32 = 28;

/// Number of values in a flattened glyph grid
pub const PIXEL_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;
