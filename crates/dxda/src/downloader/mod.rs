//! Downloader module
//!
//! This module contains all the download functionality including
//! core types, configuration, the platform API client, and the
//! file and part orchestration.

pub mod api;
pub mod batch;
pub mod config;
pub mod core;
pub mod file;
pub mod part;
pub mod r#lib;

// Re-export main types for convenience
pub use r#lib::Downloader;
pub use api::{get_token, DownloadUrl, DxApi, TokenOrigin, TokenSource, WhoAmI};
pub use batch::{FileOutcome, ManifestReport};
pub use config::{DownloadConfig, DownloadConfigBuilder, DEFAULT_API_BASE_URL};
pub use core::{
    CompositeProgressReporter, ConsoleProgressReporter, DownloadError, DownloadMetrics,
    DownloadMetricsSnapshot, ErrorSeverity, FileOperation, IntoProgressCallback, NullProgressReporter,
    ProgressCallback, ProgressEvent, ProgressReporter, ReliableClient, RequestClient, Result,
};
pub use file::{FileDownload, FileDownloader};
pub use part::fetch_part;
