//! Core types for image decoding.

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a JPEG or PNG image.
    #[error("Unsupported or unrecognized image format")]
    UnsupportedFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    Corrupted(String),
}

/// The encoded format of a source image.
///
/// Only JPEG and PNG sources are accepted; anything else is rejected at
/// decode time with [`DecodeError::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Jpeg,
    Png,
}

impl SourceFormat {
    /// Detect the source format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self, DecodeError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => Ok(SourceFormat::Jpeg),
            Ok(ImageFormat::Png) => Ok(SourceFormat::Png),
            _ => Err(DecodeError::UnsupportedFormat),
        }
    }

    /// The corresponding `image` crate format.
    pub fn to_image_format(self) -> ImageFormat {
        match self {
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
        }
    }

    /// Canonical file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpg",
            SourceFormat::Png => "png",
        }
    }
}

/// A decoded source image.
///
/// Holds the decoded pixel buffer together with the detected source format
/// and the byte length of the original encoded file. Immutable once loaded;
/// every downstream operation works on a copy or a view.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub(crate) image: DynamicImage,
    pub(crate) format: SourceFormat,
    pub(crate) encoded_len: usize,
}

impl SourceImage {
    /// The decoded pixel buffer.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// The detected source format.
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Byte length of the original encoded file.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Size of the original encoded file in binary KB (bytes / 1024).
    pub fn original_size_kb(&self) -> f64 {
        self.encoded_len as f64 / 1024.0
    }
}
