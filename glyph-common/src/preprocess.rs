//! Per-backend preprocessing
//!
//! Turns a decoded 8-bit grid into the tensor a backend expects. Two variants
//! exist:
//!
//! - **Direct**: scale to `[0, 1]` and flatten to `(1, 784)`.
//! - **Canonical glyph**: threshold, crop to the ink bounding box, resize the
//!   longer side to 20 px, center on a 28x28 canvas, transpose then mirror,
//!   and scale to a `(1, 28, 28, 1)` tensor.
//!
//! The canonical-glyph geometry (20 px box, floor centering, transpose before
//! mirror) is what the networks were trained on and must not be reordered.

use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::{Array, Array2, Array4, Axis};

use crate::codec::image_to_unit;
use crate::{BackendKind, GRID_SIZE};

/// Pixels brighter than this are ink
pub const INK_THRESHOLD: u8 = 128;

/// Length of the longer side of the glyph after resizing
pub const GLYPH_BOX: u32 = 20;

/// Preprocessing variant bound to a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessor {
    /// Flattened grid, no geometric transform
    Direct,
    /// Ink-geometry normalization
    CanonicalGlyph,
}

/// Tensor handed to a classifier
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInput {
    /// Shape `(1, 784)`
    Flat(Array2<f32>),
    /// Shape `(1, 28, 28, 1)`
    Glyph(Array4<f32>),
}

impl ModelInput {
    pub fn shape(&self) -> &[usize] {
        match self {
            ModelInput::Flat(a) => a.shape(),
            ModelInput::Glyph(a) => a.shape(),
        }
    }

    /// Values in logical (row-major) order
    pub fn values(&self) -> Vec<f32> {
        match self {
            ModelInput::Flat(a) => a.iter().copied().collect(),
            ModelInput::Glyph(a) => a.iter().copied().collect(),
        }
    }
}

impl Preprocessor {
    /// Variant used by a backend
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Lr => Preprocessor::Direct,
            BackendKind::Cnn | BackendKind::Rnn => Preprocessor::CanonicalGlyph,
        }
    }

    pub fn apply(&self, image: &GrayImage) -> ModelInput {
        match self {
            Preprocessor::Direct => ModelInput::Flat(direct(image)),
            Preprocessor::CanonicalGlyph => ModelInput::Glyph(canonical_glyph(image)),
        }
    }
}

/// Direct variant: `[0, 1]` floats in a single row
pub fn direct(image: &GrayImage) -> Array2<f32> {
    Array::from_vec(image_to_unit(image)).insert_axis(Axis(0))
}

/// Canonical-glyph variant: full pipeline to a `(1, 28, 28, 1)` tensor
pub fn canonical_glyph(image: &GrayImage) -> Array4<f32> {
    to_tensor(&orient(&normalize_geometry(image)))
}

/// Tight bounding box `(x, y, width, height)` of ink pixels
pub fn ink_bounds(image: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] <= INK_THRESHOLD {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }

    bounds.map(|(min_x, min_y, max_x, max_y)| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Size after scaling so the longer side equals `target`
///
/// Each side is rounded half-to-even, never below one pixel.
pub fn fit_longest_side(width: u32, height: u32, target: u32) -> (u32, u32) {
    let scale = target as f64 / width.max(height) as f64;
    let fit = |side: u32| ((side as f64 * scale).round_ties_even() as u32).max(1);
    (fit(width), fit(height))
}

/// Steps 1-5 of the canonical-glyph pipeline
///
/// Returns a 28x28 canvas holding the cropped, resized and centered glyph.
/// A grid without ink yields an all-zero canvas.
pub fn normalize_geometry(image: &GrayImage) -> GrayImage {
    let mut canvas = GrayImage::new(GRID_SIZE, GRID_SIZE);

    let Some((x, y, width, height)) = ink_bounds(image) else {
        return canvas;
    };

    let crop = imageops::crop_imm(image, x, y, width, height).to_image();
    let (new_width, new_height) = fit_longest_side(width, height, GLYPH_BOX);
    let glyph = if (new_width, new_height) == (width, height) {
        crop
    } else {
        imageops::resize(&crop, new_width, new_height, FilterType::Lanczos3)
    };

    let x_off = (GRID_SIZE - new_width) / 2;
    let y_off = (GRID_SIZE - new_height) / 2;
    imageops::replace(&mut canvas, &glyph, x_off as i64, y_off as i64);

    canvas
}

/// Step 6: transpose, then mirror left-right
pub fn orient(canvas: &GrayImage) -> GrayImage {
    let (width, height) = canvas.dimensions();
    let transposed = GrayImage::from_fn(height, width, |x, y| *canvas.get_pixel(y, x));
    imageops::flip_horizontal(&transposed)
}

/// Step 7: scale to `[0, 1]` and add batch and channel axes
pub fn to_tensor(canvas: &GrayImage) -> Array4<f32> {
    let (width, height) = canvas.dimensions();
    Array4::from_shape_fn((1, height as usize, width as usize, 1), |(_, row, col, _)| {
        canvas.get_pixel(col as u32, row as u32)[0] as f32 / 255.0
    })
}
