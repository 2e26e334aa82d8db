//! dxda: manifest-driven parallel download agent
//!
//! This library downloads the files listed in a platform manifest. Each file
//! is split into parts with known MD5 checksums; parts are fetched
//! concurrently with ranged GETs against a per-file signed URL, verified, and
//! written at their offset in the destination file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dxda::{get_token, read_manifest, DownloadConfig, Downloader};
//!
//! # async fn example() -> dxda::Result<()> {
//! let manifest = read_manifest("manifest.json.bz2").await?;
//! let token = get_token().expect("no API token configured");
//!
//! let config = DownloadConfig::builder()
//!     .max_concurrent_parts(16)
//!     .build();
//! let downloader = Downloader::new(config)?.with_output_root("downloads");
//!
//! let report = downloader.download_manifest(&manifest, &token.token).await?;
//! for failure in report.failures() {
//!     eprintln!("{}: {:?}", failure.name, failure.error());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Manifests**: bzip2, gzip or plain JSON, validated before anything runs
//! - **Integrity**: every part is MD5-checked before a byte hits the disk
//! - **Retry logic**: connection errors, timeouts, 429 and 5xx with capped exponential backoff
//! - **Concurrency**: one task per part, optional part and file limits
//! - **Progress tracking**: file, part and retry events plus aggregate metrics

pub mod downloader;
pub mod manifest;

// Re-export commonly used types for convenience
pub use downloader::{
    get_token, DownloadConfig, DownloadError, DownloadUrl, Downloader, DxApi, FileDownload,
    FileOutcome, ManifestReport, ProgressCallback, ProgressEvent, Result, TokenSource,
};
pub use manifest::{read_manifest, DxFile, DxPart, Manifest, PartRange};
