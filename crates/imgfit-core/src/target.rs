//! The target-size encoder.
//!
//! Given one decoded image and a file-size budget, search the codec's
//! quality/resolution space for the encoding that best approximates the
//! budget while keeping as much visual quality as possible:
//!
//! - An outer loop walks a fixed descending ladder of resolution scale
//!   factors, always resampling from the full-resolution original.
//! - An inner binary search walks integer quality levels, probing encoded
//!   sizes in memory.
//! - The first (largest) scale with any feasible quality wins, at the
//!   highest feasible quality for that scale.
//!
//! When no combination fits, the search degrades to a deterministic floor
//! (smallest scale, lowest quality) and still returns success; callers
//! detect the overflow by comparing the final size against the target.

use std::borrow::Cow;
use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::{resize, SourceImage};
use crate::encode::{self, size_kb, EncodeError, OutputFormat, TargetFormat};

/// Descending resolution ladder searched by the outer loop.
pub const SCALE_LADDER: [f32; 10] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];

/// Lowest quality the search will consider.
pub const MIN_QUALITY: u8 = 25;

/// Highest quality the search will consider.
pub const MAX_QUALITY: u8 = 95;

/// Quality recorded when an already-small source is re-saved without a search.
pub const FAST_PATH_QUALITY: u8 = 95;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The outcome of one target-size encoding.
///
/// Produced once per invocation and returned to the caller; the encoded
/// bytes are carried alongside the parameters that produced them, and are
/// skipped during serialization (status payloads carry sizes, not data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    /// Size of the original encoded file in KB.
    pub original_size_kb: f64,
    /// Resolution of the source image.
    pub original_resolution: Resolution,
    /// Size of the produced encoding in KB.
    pub final_size_kb: f64,
    /// Resolution of the produced encoding.
    pub final_resolution: Resolution,
    /// Quality level the search settled on.
    pub quality_used: u8,
    /// Scale factor the search settled on.
    pub scale_factor: f32,
    /// Codec of the produced encoding.
    pub output_format: TargetFormat,
    /// The produced encoding itself.
    #[serde(skip)]
    pub output_bytes: Vec<u8>,
}

impl CompressionResult {
    /// Whether the produced encoding actually fits the budget.
    ///
    /// `false` means the best-effort floor was emitted: the target was
    /// unreachable anywhere in the search space.
    pub fn meets_target(&self, target_kb: f64) -> bool {
        self.final_size_kb <= target_kb
    }
}

/// Encode an image to best approximate a target size in KB.
///
/// See the module documentation for the search strategy. The input image is
/// never mutated and nothing is written outside in-memory buffers.
///
/// # Errors
///
/// Returns [`EncodeError::InvalidTarget`] when `target_kb` is not a
/// positive, finite number, and [`EncodeError::Codec`] if the underlying
/// codec rejects an encoding attempt. An unreachable target is NOT an
/// error; the best-effort floor is returned as success.
pub fn encode_to_target(
    source: &SourceImage,
    target_kb: f64,
    format: OutputFormat,
) -> Result<CompressionResult, EncodeError> {
    if !target_kb.is_finite() || target_kb <= 0.0 {
        return Err(EncodeError::InvalidTarget(target_kb));
    }

    let target_format = format.resolve(source.format());
    let original = encode::normalize(source.image(), target_format);
    let original_resolution = Resolution::from(source.dimensions());
    let original_size_kb = source.original_size_kb();

    // Fast path: never degrade an image that already fits the budget.
    if original_size_kb <= target_kb {
        let bytes = match target_format {
            TargetFormat::Png => encode::encode_png_lossless(&original)?,
            TargetFormat::Jpeg => encode::encode(&original, target_format, FAST_PATH_QUALITY)?,
        };
        debug!(
            final_kb = size_kb(bytes.len()),
            "source fits budget; re-saved without search"
        );
        return Ok(build_result(
            original_size_kb,
            original_resolution,
            &original,
            bytes,
            FAST_PATH_QUALITY,
            1.0,
            target_format,
        ));
    }

    for &scale in &SCALE_LADDER {
        let candidate: Cow<'_, DynamicImage> = if scale < 1.0 {
            Cow::Owned(resize::scale(&original, scale))
        } else {
            Cow::Borrowed(original.as_ref())
        };

        // Probe the quality floor first: if even that overflows the target,
        // no quality at this scale can fit and the search moves straight to
        // the next smaller scale.
        let floor_kb = size_kb(encode::encode(&candidate, target_format, MIN_QUALITY)?.len());
        if floor_kb > target_kb {
            debug!(scale, floor_kb, "quality floor overflows target; skipping scale");
            continue;
        }

        let found = search_quality(target_kb, |quality| {
            encode::encode(&candidate, target_format, quality)
        })?;

        if let Some((quality, bytes)) = found {
            debug!(scale, quality, final_kb = size_kb(bytes.len()), "target met");
            return Ok(build_result(
                original_size_kb,
                original_resolution,
                &candidate,
                bytes,
                quality,
                scale,
                target_format,
            ));
        }
    }

    // Best-effort floor: nothing in the search space fits the budget. Emit
    // the smallest encoding as success; the caller detects the degradation
    // from the final size exceeding the target.
    let scale = SCALE_LADDER[SCALE_LADDER.len() - 1];
    let floor_image = resize::scale(&original, scale);
    let bytes = encode::encode(&floor_image, target_format, MIN_QUALITY)?;
    debug!(
        final_kb = size_kb(bytes.len()),
        target_kb, "target unreachable; emitting best-effort floor"
    );
    Ok(build_result(
        original_size_kb,
        original_resolution,
        &floor_image,
        bytes,
        MIN_QUALITY,
        scale,
        target_format,
    ))
}

/// Binary search for the highest quality in `[MIN_QUALITY, MAX_QUALITY]`
/// whose encoding fits the target, returning that attempt's exact bytes.
///
/// A feasible midpoint records itself as best-known and narrows the search
/// upward (a higher quality may still fit); an infeasible one narrows it
/// downward. Terminates when the interval collapses. Relies on encoded size
/// being non-decreasing in quality.
fn search_quality<P>(target_kb: f64, mut probe: P) -> Result<Option<(u8, Vec<u8>)>, EncodeError>
where
    P: FnMut(u8) -> Result<Vec<u8>, EncodeError>,
{
    let mut lo = MIN_QUALITY;
    let mut hi = MAX_QUALITY;
    let mut best: Option<(u8, Vec<u8>)> = None;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let bytes = probe(mid)?;

        if size_kb(bytes.len()) <= target_kb {
            best = Some((mid, bytes));
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }

    Ok(best)
}

fn build_result(
    original_size_kb: f64,
    original_resolution: Resolution,
    image: &DynamicImage,
    bytes: Vec<u8>,
    quality: u8,
    scale: f32,
    format: TargetFormat,
) -> CompressionResult {
    CompressionResult {
        original_size_kb,
        original_resolution,
        final_size_kb: size_kb(bytes.len()),
        final_resolution: Resolution::new(image.width(), image.height()),
        quality_used: quality,
        scale_factor: scale,
        output_format: format,
        output_bytes: bytes,
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
