//! imgfit Core - Target-size image encoding library
//!
//! This crate provides the core functionality for imgfit: re-encoding a
//! JPEG or PNG image so that its file size best approximates a caller-given
//! budget while keeping as much resolution and quality as possible.
//!
//! The pipeline is decode -> (resample ->) encode, driven by a two-level
//! search: an outer loop over descending resolution scale factors and an
//! inner binary search over quality levels, probing encoded sizes entirely
//! in memory. See [`target::encode_to_target`] for the full strategy.
//!
//! Every invocation is a pure, synchronous, CPU-bound computation over its
//! own image copy, so callers may freely run one invocation per file in
//! parallel.

pub mod decode;
pub mod encode;
pub mod target;

use thiserror::Error;

pub use decode::{DecodeError, SourceFormat, SourceImage};
pub use encode::{EncodeError, OutputFormat, TargetFormat};
pub use target::{encode_to_target, CompressionResult, Resolution};

/// Any error a full decode-and-compress invocation can produce.
///
/// Both variants are per-image and caller-recoverable: a failed file is
/// reported and skipped, it never aborts a batch.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Decode raw image bytes and re-encode them to fit a target size in KB.
///
/// Convenience wrapper combining [`SourceImage::from_bytes`] and
/// [`encode_to_target`].
pub fn compress_to_target(
    bytes: &[u8],
    target_kb: f64,
    format: OutputFormat,
) -> Result<CompressionResult, Error> {
    let source = SourceImage::from_bytes(bytes)?;
    Ok(encode_to_target(&source, target_kb, format)?)
}
