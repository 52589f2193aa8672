//! Image encoding pipeline for imgfit.
//!
//! Both codecs encode to an in-memory buffer and are driven through a single
//! unified quality knob: JPEG uses it as lossy quality directly, PNG maps it
//! onto a discrete compression-effort level. This is what lets one search
//! loop serve both formats.

mod jpeg;
mod png;

use std::borrow::Cow;

use image::{ColorType, DynamicImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::SourceFormat;

pub use png::compression_effort;

/// Errors that can occur during encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The requested target size is not a positive, finite number.
    #[error("Invalid target size: {0} KB")]
    InvalidTarget(f64),

    /// The codec rejected the image or parameters.
    #[error("{format} encoding failed: {message}")]
    Codec {
        format: TargetFormat,
        message: String,
    },
}

/// The concrete output codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFormat {
    Jpeg,
    Png,
}

impl TargetFormat {
    /// Canonical file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Png => "png",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TargetFormat::Jpeg => "JPEG",
            TargetFormat::Png => "PNG",
        })
    }
}

/// The output format requested by the caller.
///
/// `Original` keeps PNG sources as PNG and re-encodes everything else as
/// JPEG; the explicit variants always win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Original,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Resolve the concrete codec for a given source format.
    pub fn resolve(self, source: SourceFormat) -> TargetFormat {
        match self {
            OutputFormat::Jpeg => TargetFormat::Jpeg,
            OutputFormat::Png => TargetFormat::Png,
            OutputFormat::Original => match source {
                SourceFormat::Png => TargetFormat::Png,
                SourceFormat::Jpeg => TargetFormat::Jpeg,
            },
        }
    }

    /// Parse a user-supplied format name (`original`, `jpg`, `jpeg`, `png`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "original" => Some(OutputFormat::Original),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

/// Convert an image to a color mode the output codec accepts.
///
/// JPEG rejects alpha, so anything that is not already 8-bit RGB or
/// grayscale is flattened to RGB8. PNG keeps the common 8-bit layouts as
/// decoded and funnels everything else (16-bit, extended layouts) to RGBA8.
/// Returns a borrow when no conversion is needed.
pub fn normalize(image: &DynamicImage, format: TargetFormat) -> Cow<'_, DynamicImage> {
    match format {
        TargetFormat::Jpeg => match image.color() {
            ColorType::Rgb8 | ColorType::L8 => Cow::Borrowed(image),
            _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        TargetFormat::Png => match image.color() {
            ColorType::Rgb8 | ColorType::Rgba8 | ColorType::L8 | ColorType::La8 => {
                Cow::Borrowed(image)
            }
            _ => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        },
    }
}

/// Encode an image to an in-memory buffer at the given quality.
///
/// Quality is the unified knob in [25, 95]: lossy quality for JPEG,
/// compression effort (via [`compression_effort`]) for PNG. The image must
/// already be normalized for the codec (see [`normalize`]).
pub fn encode(
    image: &DynamicImage,
    format: TargetFormat,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    match format {
        TargetFormat::Jpeg => jpeg::encode_jpeg(image, quality),
        TargetFormat::Png => png::encode_png(image, quality),
    }
}

/// Re-encode losslessly at the codec's maximum compression.
///
/// Used by the fast path for PNG output, where the original already fits
/// the budget and must not be degraded.
pub fn encode_png_lossless(image: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    png::encode_lossless(image)
}

/// Encode into memory and report the size in binary KB (bytes / 1024).
///
/// This is the size-estimation primitive of the search: no bytes ever touch
/// persistent storage.
pub fn estimate_size_kb(
    image: &DynamicImage,
    format: TargetFormat,
    quality: u8,
) -> Result<f64, EncodeError> {
    Ok(size_kb(encode(image, format, quality)?.len()))
}

/// Byte length as binary KB.
pub(crate) fn size_kb(len: usize) -> f64 {
    len as f64 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage, RgbaImage};

    fn noise_rgb(width: u32, height: u32) -> DynamicImage {
        // Deterministic pseudo-noise so lossy sizes respond to quality
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17));
            image::Rgb([
                (v.wrapping_mul(97) % 256) as u8,
                (v.wrapping_mul(57) % 256) as u8,
                (v.wrapping_mul(13) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_output_format_resolution() {
        assert_eq!(
            OutputFormat::Original.resolve(SourceFormat::Png),
            TargetFormat::Png
        );
        assert_eq!(
            OutputFormat::Original.resolve(SourceFormat::Jpeg),
            TargetFormat::Jpeg
        );
        // Explicit formats override the source
        assert_eq!(
            OutputFormat::Jpeg.resolve(SourceFormat::Png),
            TargetFormat::Jpeg
        );
        assert_eq!(
            OutputFormat::Png.resolve(SourceFormat::Jpeg),
            TargetFormat::Png
        );
    }

    #[test]
    fn test_output_format_from_name() {
        assert_eq!(OutputFormat::from_name("original"), Some(OutputFormat::Original));
        assert_eq!(OutputFormat::from_name("jpg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_name("JPEG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_name("png"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_name("webp"), None);
    }

    #[test]
    fn test_normalize_flattens_alpha_for_jpeg() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([200, 100, 50, 128]),
        ));
        let normalized = normalize(&rgba, TargetFormat::Jpeg);
        assert_eq!(normalized.color(), ColorType::Rgb8);
    }

    #[test]
    fn test_normalize_borrows_when_compatible() {
        let rgb = noise_rgb(8, 8);
        assert!(matches!(
            normalize(&rgb, TargetFormat::Jpeg),
            Cow::Borrowed(_)
        ));
        assert!(matches!(normalize(&rgb, TargetFormat::Png), Cow::Borrowed(_)));

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, image::Luma([128])));
        assert!(matches!(
            normalize(&gray, TargetFormat::Jpeg),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_normalize_keeps_alpha_for_png() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([200, 100, 50, 128]),
        ));
        let normalized = normalize(&rgba, TargetFormat::Png);
        assert_eq!(normalized.color(), ColorType::Rgba8);
    }

    #[test]
    fn test_encode_jpeg_magic_bytes() {
        let img = noise_rgb(32, 32);
        let bytes = encode(&img, TargetFormat::Jpeg, 80).unwrap();

        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_png_magic_bytes() {
        let img = noise_rgb(32, 32);
        let bytes = encode(&img, TargetFormat::Png, 80).unwrap();

        assert_eq!(&bytes[0..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_estimate_size_kb_matches_encoded_length() {
        let img = noise_rgb(32, 32);
        let bytes = encode(&img, TargetFormat::Jpeg, 75).unwrap();
        let estimated = estimate_size_kb(&img, TargetFormat::Jpeg, 75).unwrap();

        assert!((estimated - bytes.len() as f64 / 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_jpeg_size_monotonic_in_quality() {
        // The search relies on size being non-decreasing in quality. Verify
        // at spread-out sample points where codec jitter cannot mask it.
        let img = noise_rgb(64, 64);
        let low = estimate_size_kb(&img, TargetFormat::Jpeg, 25).unwrap();
        let mid = estimate_size_kb(&img, TargetFormat::Jpeg, 60).unwrap();
        let high = estimate_size_kb(&img, TargetFormat::Jpeg, 95).unwrap();

        assert!(low <= mid, "25 -> 60: {low} > {mid}");
        assert!(mid <= high, "60 -> 95: {mid} > {high}");
    }

    #[test]
    fn test_jpeg_size_monotonic_in_scale() {
        let img = noise_rgb(64, 64);
        let half = crate::decode::resize::scale(&img, 0.5);

        let full_size = estimate_size_kb(&img, TargetFormat::Jpeg, 75).unwrap();
        let half_size = estimate_size_kb(&half, TargetFormat::Jpeg, 75).unwrap();

        assert!(half_size <= full_size);
    }

    #[test]
    fn test_png_size_monotonic_in_quality() {
        // Lower quality maps to higher effort, so sizes must not grow as
        // quality drops. Use compressible data where the tiers separate.
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        }));
        let low = estimate_size_kb(&img, TargetFormat::Png, 25).unwrap();
        let high = estimate_size_kb(&img, TargetFormat::Png, 95).unwrap();

        assert!(low <= high);
    }

    #[test]
    fn test_encode_one_pixel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 0])));

        assert!(!encode(&img, TargetFormat::Jpeg, 25).unwrap().is_empty());
        assert!(!encode(&img, TargetFormat::Png, 25).unwrap().is_empty());
    }
}
