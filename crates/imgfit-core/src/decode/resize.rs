//! Scale-factor resampling for the resolution search.
//!
//! Resampling is always performed from the full-resolution original, never
//! cumulatively from a previously downscaled image, so repeated probes at
//! different scales do not compound quality loss.

use image::imageops::FilterType;
use image::DynamicImage;

/// Compute the pixel dimensions for a scale factor.
///
/// Dimensions are rounded to the nearest integer with a 1 px floor, so even
/// extreme factors on tiny images produce a valid image.
pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let factor = factor as f64;
    let new_width = (width as f64 * factor).round().max(1.0) as u32;
    let new_height = (height as f64 * factor).round().max(1.0) as u32;
    (new_width, new_height)
}

/// Resample an image by a scale factor using Lanczos3.
///
/// A factor of 1.0 (or greater) returns an unscaled copy. The input image
/// is not modified.
pub fn scale(image: &DynamicImage, factor: f32) -> DynamicImage {
    if factor >= 1.0 {
        return image.clone();
    }

    let (width, height) = scaled_dimensions(image.width(), image.height(), factor);
    image.resize_exact(width, height, FilterType::Lanczos3)
}
