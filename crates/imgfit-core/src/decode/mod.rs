//! Image decoding pipeline for imgfit.
//!
//! This module provides functionality for:
//! - Sniffing and decoding JPEG and PNG sources
//! - Applying EXIF orientation to JPEG sources at load time
//! - Scale-factor resampling for the resolution search
//!
//! # Architecture
//!
//! Decoding produces an immutable [`SourceImage`] that owns the decoded
//! pixel buffer together with the detected format and the original encoded
//! byte length. All downstream work (normalization, resampling, encoding
//! probes) reads from it without mutating it.

mod read;
pub mod resize;
mod types;

pub use types::{DecodeError, SourceFormat, SourceImage};
