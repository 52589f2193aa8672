//! imgfit Batch - batch orchestration over the imgfit core encoder
//!
//! This crate provides the service layer around [`imgfit_core`]:
//!
//! - `batch` - parallel per-file compression with per-file error isolation
//! - `session` - validated session tokens and a TTL-evicting result store
//! - `archive` - in-memory ZIP packaging of batch outputs
//!
//! Compression itself is embarrassingly parallel (one pure invocation per
//! file), so the batch layer fans out with a worker pool and recombines
//! results in input order. The crate also ships the `imgfit` CLI binary.

pub mod archive;
pub mod batch;
pub mod session;

pub use archive::{archive_name, bundle_zip};
pub use batch::{
    process_batch, BatchError, BatchOptions, BatchReport, FileOutcome, InputFile,
};
pub use session::{SessionError, SessionId, SessionStore};

// Re-export the core types callers need to build requests and read results.
pub use imgfit_core::{CompressionResult, OutputFormat, Resolution, TargetFormat};
