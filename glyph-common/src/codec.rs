//! Image artifact codec
//!
//! Converts the flat pixel vector submitted by clients into the 28x28 8-bit
//! grayscale PNG persisted for every request, and reads such rasters back
//! into grids for preprocessing.

use std::path::Path;

use image::imageops::FilterType;
use image::{GrayImage, ImageFormat};

use crate::{Error, Result, GRID_SIZE, PIXEL_COUNT};

/// Check a pixel vector before anything is written
///
/// The vector must hold exactly 784 finite values in `[0, 1]`.
pub fn validate_pixels(pixels: &[f32]) -> Result<()> {
    if pixels.len() != PIXEL_COUNT {
        return Err(Error::InvalidInput(format!(
            "expected {} pixels, got {}",
            PIXEL_COUNT,
            pixels.len()
        )));
    }

    if let Some((index, value)) = pixels
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
    {
        return Err(Error::InvalidInput(format!(
            "pixel {} out of range [0, 1]: {}",
            index, value
        )));
    }

    Ok(())
}

/// Reshape a pixel vector into a 28x28 grid scaled to `[0, 255]`
///
/// Values are truncated, not rounded, when converted to 8 bits.
pub fn pixels_to_image(pixels: &[f32]) -> Result<GrayImage> {
    validate_pixels(pixels)?;

    let bytes: Vec<u8> = pixels.iter().map(|&v| (v * 255.0) as u8).collect();
    GrayImage::from_raw(GRID_SIZE, GRID_SIZE, bytes)
        .ok_or_else(|| Error::Internal("pixel buffer does not fill a 28x28 grid".to_string()))
}

/// Write the artifact for a pixel vector as a single-channel PNG
pub fn encode(pixels: &[f32], path: &Path) -> Result<()> {
    let image = pixels_to_image(pixels)?;
    image.save_with_format(path, ImageFormat::Png)?;

    tracing::debug!(path = %path.display(), "Wrote image artifact");
    Ok(())
}

/// Read a raster as an 8-bit 28x28 grid
///
/// Any format the `image` crate understands is accepted. Colour images are
/// converted to luma; other sizes are resampled with a bicubic filter.
pub fn decode(path: &Path) -> Result<GrayImage> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "input file not found: {}",
            path.display()
        )));
    }

    let gray = image::open(path)?.to_luma8();
    if gray.dimensions() == (GRID_SIZE, GRID_SIZE) {
        return Ok(gray);
    }

    tracing::debug!(
        path = %path.display(),
        width = gray.width(),
        height = gray.height(),
        "Resampling artifact to 28x28"
    );
    Ok(image::imageops::resize(
        &gray,
        GRID_SIZE,
        GRID_SIZE,
        FilterType::CatmullRom,
    ))
}

/// Rescale an 8-bit grid to `[0, 1]`, row-major
pub fn image_to_unit(image: &GrayImage) -> Vec<f32> {
    image.as_raw().iter().map(|&b| b as f32 / 255.0).collect()
}
