//! PNG encoding behind the unified quality knob.
//!
//! PNG has no lossy quality; its tunable is compression effort (higher =
//! smaller and slower). The search's quality value (25-95) is mapped onto a
//! discrete effort level 1-9 so the same binary search drives both codecs,
//! then the effort is bucketed onto the encoder's compression tiers.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

use super::{EncodeError, TargetFormat};

/// Map the unified quality knob onto a PNG compression-effort level.
///
/// `effort = clamp(9 - quality / 11, 1, 9)`: quality 95 is the lightest
/// effort (1), quality 25 lands at effort 7, and anything below quality 12
/// reaches the maximum (9).
pub fn compression_effort(quality: u8) -> u8 {
    (9 - i32::from(quality) / 11).clamp(1, 9) as u8
}

/// Bucket an effort level (1-9) onto the encoder's compression tiers.
fn compression_tier(effort: u8) -> CompressionType {
    match effort {
        1..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode an image to PNG bytes at the given (unified) quality.
pub(super) fn encode_png(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let tier = compression_tier(compression_effort(quality));
    write_png(image, tier)
}

/// Encode an image to PNG bytes at maximum compression.
///
/// Used when an already-small original is re-saved without a search.
pub(super) fn encode_lossless(image: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    write_png(image, CompressionType::Best)
}

fn write_png(image: &DynamicImage, tier: CompressionType) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut buffer, tier, FilterType::Adaptive);

    image
        .write_with_encoder(encoder)
        .map_err(|e| EncodeError::Codec {
            format: TargetFormat::Png,
            message: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}
