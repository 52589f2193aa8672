//! In-memory ZIP packaging of batch results.

use std::io::{Cursor, Write};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::batch::{BatchError, BatchReport};
use crate::session::SessionId;

/// Bundle a report's successful outputs into a deflate ZIP, entirely in
/// memory. Failed entries are skipped; they have no bytes to package.
pub fn bundle_zip(report: &BatchReport) -> Result<Vec<u8>, BatchError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut bundled = 0usize;
    for outcome in report.successes() {
        let Some(bytes) = outcome.output_bytes() else {
            continue;
        };
        writer
            .start_file(outcome.filename.as_str(), options)
            .map_err(archive_err)?;
        writer.write_all(bytes).map_err(archive_err)?;
        bundled += 1;
    }

    let cursor = writer.finish().map_err(archive_err)?;
    let bytes = cursor.into_inner();

    info!(bundled, size_bytes = bytes.len(), "archive bundled");
    Ok(bytes)
}

/// Download name for a session's archive.
pub fn archive_name(session: &SessionId) -> String {
    format!("compressed_images_{}.zip", session.short())
}

fn archive_err(e: impl std::fmt::Display) -> BatchError {
    BatchError::Archive(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use image::{DynamicImage, ImageFormat, RgbImage};
    use zip::ZipArchive;

    use crate::batch::{process_batch, BatchOptions, InputFile};
    use imgfit_core::OutputFormat;

    fn png_file(name: &str) -> InputFile {
        let img = RgbImage::from_fn(24, 24, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        InputFile::new(name, bytes)
    }

    fn sample_report() -> BatchReport {
        let options = BatchOptions {
            target_kb: 500.0,
            output_format: OutputFormat::Original,
        };
        process_batch(vec![png_file("a.png"), png_file("b.png")], &options).unwrap()
    }

    #[test]
    fn test_bundle_zip_roundtrip() {
        let report = sample_report();
        let bytes = bundle_zip(&report).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut entry = archive.by_name("a.png").unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();

        assert_eq!(contents, report.outcomes[0].output_bytes().unwrap());
    }

    #[test]
    fn test_bundle_zip_skips_failures() {
        let options = BatchOptions {
            target_kb: 500.0,
            output_format: OutputFormat::Original,
        };
        let report = process_batch(
            vec![png_file("ok.png"), InputFile::new("bad.png", b"junk".to_vec())],
            &options,
        )
        .unwrap();

        let bytes = bundle_zip(&report).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_archive_name_uses_short_id() {
        let id = SessionId::new();
        let name = archive_name(&id);

        assert!(name.starts_with("compressed_images_"));
        assert!(name.ends_with(".zip"));
        assert!(name.contains(&id.short()));
    }
}
