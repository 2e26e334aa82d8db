//! Core types used throughout the downloader system
//!
//! This module contains the fundamental types that all other modules depend on.
//! By organizing these in a core module, we make the dependency relationships clear.

pub mod error;
pub mod files;
pub mod http;
pub mod metrics;
pub mod progress;
pub mod validation;

// Re-export main types for convenience
pub use error::{is_retryable_status, DownloadError, ErrorSeverity, FileOperation, Result};
pub use files::{DestinationFile, PartWriter};
pub use http::{HttpRequest, HttpResponse, ReliableClient, RequestClient};
pub use metrics::{DownloadMetrics, DownloadMetricsSnapshot};
pub use progress::{
    CompositeProgressReporter, ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter,
    ProgressCallback, ProgressEvent, ProgressReporter,
};
pub use validation::{md5_hex, PartValidation};
