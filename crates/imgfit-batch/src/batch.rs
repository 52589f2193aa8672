//! Batch orchestration over the target-size encoder.
//!
//! A batch is a list of uploaded files plus one shared target size and
//! output format. Files are compressed in parallel (one invocation per
//! file, no shared state) with per-file error isolation: a file that fails
//! to decode or encode is marked failed in the report and the rest of the
//! batch continues. Only a batch with zero successes is itself an error.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use imgfit_core::{compress_to_target, CompressionResult, OutputFormat};

/// File extensions accepted into a batch (case-insensitive).
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Shared parameters for one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Target size per image in KB.
    pub target_kb: f64,
    /// Requested output format for every image.
    pub output_format: OutputFormat,
}

/// One uploaded file: a client-supplied name and the raw bytes.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Batch-level errors.
///
/// Per-file failures never surface here; they are carried inside the
/// report. A batch only fails as a whole when nothing in it succeeded.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No valid image files were processed")]
    NoFilesProcessed,

    #[error("Invalid target size: {0} KB")]
    InvalidTarget(f64),

    #[error("Archive packaging failed: {0}")]
    Archive(String),
}

/// Per-file entry in a batch report.
///
/// Successful entries flatten the compression result into the payload
/// (sizes, resolutions, parameters; the output bytes themselves are
/// skipped). Failed entries carry the error text instead.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    /// Output filename, sanitized, de-duplicated, extension rewritten.
    pub filename: String,
    /// The name the file was uploaded under.
    pub original_filename: String,
    pub success: bool,
    /// Set on success: whether the result overflowed the target and is a
    /// best-effort floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_effort: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub result: Option<CompressionResult>,
}

impl FileOutcome {
    fn success(
        filename: String,
        original_filename: String,
        result: CompressionResult,
        target_kb: f64,
    ) -> Self {
        Self {
            filename,
            original_filename,
            success: true,
            best_effort: Some(!result.meets_target(target_kb)),
            error: None,
            result: Some(result),
        }
    }

    fn failure(filename: String, original_filename: String, error: String) -> Self {
        Self {
            filename,
            original_filename,
            success: false,
            best_effort: None,
            error: Some(error),
            result: None,
        }
    }

    /// The encoded output, if this entry succeeded.
    pub fn output_bytes(&self) -> Option<&[u8]> {
        self.result.as_ref().map(|r| r.output_bytes.as_slice())
    }
}

/// The outcome of a whole batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub target_kb: f64,
    /// Number of files compressed successfully.
    pub processed_count: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// The successful entries, in input order.
    pub fn successes(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }
}

/// Compress every file in the batch against the shared options.
///
/// Files are processed in parallel; the report preserves input order.
///
/// # Errors
///
/// Returns [`BatchError::InvalidTarget`] for a non-positive target and
/// [`BatchError::NoFilesProcessed`] when not a single file succeeded.
pub fn process_batch(
    files: Vec<InputFile>,
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    if !options.target_kb.is_finite() || options.target_kb <= 0.0 {
        warn!(target_kb = options.target_kb, "rejected batch: invalid target size");
        return Err(BatchError::InvalidTarget(options.target_kb));
    }

    info!(
        count = files.len(),
        target_kb = options.target_kb,
        "batch received"
    );

    let output_names = assign_output_names(&files, options.output_format);
    let work: Vec<(InputFile, String)> = files.into_iter().zip(output_names).collect();

    let outcomes: Vec<FileOutcome> = work
        .into_par_iter()
        .map(|(file, output_name)| compress_one(file, output_name, options))
        .collect();

    let processed_count = outcomes.iter().filter(|o| o.success).count();
    if processed_count == 0 {
        warn!("batch produced no successful files");
        return Err(BatchError::NoFilesProcessed);
    }

    info!(processed_count, "batch complete");
    Ok(BatchReport {
        target_kb: options.target_kb,
        processed_count,
        outcomes,
    })
}

fn compress_one(file: InputFile, output_name: String, options: &BatchOptions) -> FileOutcome {
    let original_filename = file.filename.clone();

    if !has_allowed_extension(&file.filename) {
        warn!(filename = %original_filename, "rejected: extension not allowed");
        return FileOutcome::failure(
            output_name,
            original_filename,
            "File extension not allowed (jpg, jpeg, png)".to_string(),
        );
    }

    match compress_to_target(&file.bytes, options.target_kb, options.output_format) {
        Ok(result) => {
            info!(
                filename = %output_name,
                original_kb = result.original_size_kb,
                final_kb = result.final_size_kb,
                quality = result.quality_used,
                scale = result.scale_factor,
                "compressed"
            );
            FileOutcome::success(output_name, original_filename, result, options.target_kb)
        }
        Err(e) => {
            warn!(filename = %original_filename, error = %e, "compression failed");
            FileOutcome::failure(output_name, original_filename, e.to_string())
        }
    }
}

/// Pre-compute a safe, unique output filename for every input.
///
/// Names are sanitized to a bare basename, the extension is rewritten to
/// the predicted output codec, and clashes are disambiguated with a
/// numeric suffix (`photo.jpg`, `photo_1.jpg`, ...).
fn assign_output_names(files: &[InputFile], format: OutputFormat) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();

    files
        .iter()
        .map(|file| {
            let safe = sanitize_filename(&file.filename);
            let stem = stem_of(&safe);
            let ext = predicted_extension(&safe, format);

            let mut candidate = format!("{stem}.{ext}");
            let mut counter = 1;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{stem}_{counter}.{ext}");
                counter += 1;
            }
            candidate
        })
        .collect()
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Keeps only the final path component and a conservative character set,
/// so session directories and archives can never be escaped through a
/// crafted name.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn has_allowed_extension(name: &str) -> bool {
    extension_of(name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// The output extension a file will get, derived the same way the encoder
/// resolves its codec: explicit formats win, `Original` keeps `.png`
/// sources as PNG and maps everything else to JPEG.
fn predicted_extension(name: &str, format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Jpeg => "jpg",
        OutputFormat::Png => "png",
        OutputFormat::Original => match extension_of(name).as_deref() {
            Some("png") => "png",
            _ => "jpg",
        },
    }
}
