//! JPEG encoding via the `image` crate's encoder.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use super::{EncodeError, TargetFormat};

/// Encode an image to JPEG bytes at the given quality.
///
/// Quality is clamped to the encoder's [1, 100] range. The image must not
/// carry an alpha channel; [`super::normalize`] takes care of that before
/// any probe.
pub(super) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let quality = quality.clamp(1, 100);

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

    image
        .write_with_encoder(encoder)
        .map_err(|e| EncodeError::Codec {
            format: TargetFormat::Jpeg,
            message: e.to_string(),
        })?;

    Ok(buffer.into_inner())
}
