//! Decoding source images from raw bytes, with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, SourceFormat, SourceImage};

impl SourceImage {
    /// Decode a JPEG or PNG image from raw file bytes.
    ///
    /// For JPEG sources the EXIF orientation is applied to the pixel buffer
    /// at load time: re-encoded output carries no metadata, so the pixels
    /// themselves must be upright.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedFormat`] if the bytes are not a
    /// JPEG or PNG file, and [`DecodeError::Corrupted`] if the file is
    /// recognized but cannot be decoded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let format = SourceFormat::sniff(bytes)?;

        let reader = ImageReader::with_format(Cursor::new(bytes), format.to_image_format());
        let image = reader
            .decode()
            .map_err(|e| DecodeError::Corrupted(e.to_string()))?;

        let image = match format {
            SourceFormat::Jpeg => apply_orientation(image, exif_orientation(bytes)),
            SourceFormat::Png => image,
        };

        Ok(SourceImage {
            image,
            format,
            encoded_len: bytes.len(),
        })
    }
}

/// Extract the EXIF orientation value (1-8) from JPEG bytes.
///
/// Returns 1 (normal) if no EXIF data is present or the orientation tag
/// cannot be read.
fn exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    }
}

/// Apply an EXIF orientation (1-8) to a decoded image.
///
/// Unknown values are treated as normal orientation.
fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
