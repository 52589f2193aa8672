use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use imgfit_batch::{bundle_zip, process_batch, BatchOptions, InputFile, OutputFormat};

/// Compress a batch of JPEG/PNG images to a target file size.
#[derive(Parser, Debug)]
#[command(name = "imgfit")]
#[command(about = "Compress JPEG/PNG images to a target file size in KB")]
struct Args {
    /// Target size per image in KB
    #[arg(short, long)]
    target_kb: f64,

    /// Output format: original, jpg, or png
    #[arg(short, long, default_value = "original")]
    format: String,

    /// Directory for the compressed outputs (default: current directory)
    #[arg(short, long, conflicts_with = "zip")]
    out: Option<PathBuf>,

    /// Bundle the outputs into a single ZIP archive at this path
    #[arg(short, long)]
    zip: Option<PathBuf>,

    /// Input image files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let format = parse_format(&args.format)?;

    let mut files = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("file")
            .to_string();
        files.push(InputFile::new(filename, bytes));
    }

    let options = BatchOptions {
        target_kb: args.target_kb,
        output_format: format,
    };
    let report = process_batch(files, &options)?;

    for outcome in &report.outcomes {
        if !outcome.success {
            eprintln!(
                "failed: {} ({})",
                outcome.original_filename,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        } else if outcome.best_effort == Some(true) {
            eprintln!(
                "best effort: {} exceeds the target even at minimum quality and scale",
                outcome.filename
            );
        }
    }

    if let Some(zip_path) = &args.zip {
        let bytes = bundle_zip(&report)?;
        fs::write(zip_path, &bytes)
            .with_context(|| format!("failed to write {}", zip_path.display()))?;
        println!(
            "Bundled {} compressed images into {}",
            report.processed_count,
            zip_path.display()
        );
    } else {
        let out_dir = args.out.clone().unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        for outcome in report.successes() {
            if let Some(bytes) = outcome.output_bytes() {
                let path = out_dir.join(&outcome.filename);
                fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
        println!(
            "Wrote {} compressed images to {}",
            report.processed_count,
            out_dir.display()
        );
    }

    Ok(())
}

/// Parse a format name into an output format.
fn parse_format(name: &str) -> Result<OutputFormat> {
    OutputFormat::from_name(name)
        .ok_or_else(|| anyhow::anyhow!("Invalid output format: {name}. Use: original, jpg, png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};

    #[test]
    fn test_parse_format() {
        assert!(matches!(
            parse_format("original"),
            Ok(OutputFormat::Original)
        ));
        assert!(matches!(parse_format("jpg"), Ok(OutputFormat::Jpeg)));
        assert!(matches!(parse_format("PNG"), Ok(OutputFormat::Png)));
        assert!(parse_format("gif").is_err());
    }

    #[test]
    fn test_run_writes_outputs_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("photo.png");

        let img = RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        fs::write(&input_path, &bytes).unwrap();

        let out_dir = dir.path().join("out");
        let args = Args {
            target_kb: 500.0,
            format: "original".to_string(),
            out: Some(out_dir.clone()),
            zip: None,
            inputs: vec![input_path],
        };

        run(args).unwrap();
        assert!(out_dir.join("photo.png").exists());
    }

    #[test]
    fn test_run_writes_zip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("photo.jpg");

        let img = RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        fs::write(&input_path, &bytes).unwrap();

        let zip_path = dir.path().join("bundle.zip");
        let args = Args {
            target_kb: 500.0,
            format: "original".to_string(),
            out: None,
            zip: Some(zip_path.clone()),
            inputs: vec![input_path],
        };

        run(args).unwrap();
        assert!(zip_path.exists());
        assert!(fs::metadata(&zip_path).unwrap().len() > 0);
    }

    #[test]
    fn test_run_fails_on_missing_input() {
        let args = Args {
            target_kb: 100.0,
            format: "original".to_string(),
            out: None,
            zip: None,
            inputs: vec![PathBuf::from("/nonexistent/image.png")],
        };

        assert!(run(args).is_err());
    }
}
