//! Error types for the download engine with context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the downloader with context and recovery information
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP transport errors with context
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Network timeout
    #[error("Request to '{url}' timed out after {duration_secs}s (try increasing timeout or check network)")]
    NetworkTimeout {
        url: String,
        duration_secs: u64,
    },

    /// Final response carried a non-2xx status
    #[error("{method} request to '{url}' failed with status {status}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// URL parsing errors with helpful suggestions
    #[error("Invalid URL '{url}': {suggestion}")]
    InvalidUrl {
        url: String,
        suggestion: String,
        #[source]
        source: url::ParseError,
    },

    /// A part's content hash did not match the manifest
    #[error("MD5 of part {part} of '{file}' does not match stored checksum: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: PathBuf,
        part: u32,
        expected: String,
        actual: String,
    },

    /// Returned byte count does not fit the part's assigned range
    #[error("Size mismatch for part {part} of '{file}': expected {expected} bytes, got {actual} bytes (difference: {diff} bytes)")]
    SizeMismatch {
        file: PathBuf,
        part: u32,
        expected: u64,
        actual: u64,
        diff: i64,
    },

    /// Retry exhaustion with context
    #[error("Maximum retry attempts ({max_retries}) exceeded for '{url}' after {total_duration_secs}s: {last_error}")]
    MaxRetriesExceeded {
        url: String,
        max_retries: usize,
        total_duration_secs: u64,
        last_error: String,
    },

    /// Manifest failed validation; nothing was downloaded
    #[error("Malformed manifest: {reason}")]
    MalformedManifest {
        reason: String,
    },

    /// Manifest bytes could not be decompressed or parsed
    #[error("Failed to decode manifest: {reason}")]
    ManifestDecode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// API response body did not have the expected shape
    #[error("Unexpected response from '{url}': {reason}")]
    InvalidResponse {
        url: String,
        reason: String,
    },

    /// Configuration or input errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// A spawned part task panicked or was aborted
    #[error("Part task failed for '{file}': {reason}")]
    TaskFailed {
        file: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Part download cancelled because a sibling part failed
    #[error("Download cancelled: {reason}")]
    Cancelled {
        reason: String,
        url: Option<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    CreateDir,
    Allocate,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Allocate => write!(f, "pre-allocating"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Check if error is recoverable at the transport layer (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            DownloadError::HttpRequest { source, .. } => {
                // Connection-level failures carry no status and are worth retrying
                source.status().map_or(true, |status| status.is_server_error() || status.as_u16() == 429)
            }
            DownloadError::NetworkTimeout { .. } => true,
            DownloadError::HttpStatus { status, .. } => is_retryable_status(*status),
            DownloadError::FileSystem { source, .. } => {
                matches!(source.kind(),
                    std::io::ErrorKind::Interrupted |
                    std::io::ErrorKind::TimedOut |
                    std::io::ErrorKind::WouldBlock
                )
            }
            DownloadError::MaxRetriesExceeded { .. } => false,
            DownloadError::ChecksumMismatch { .. } => false,
            DownloadError::SizeMismatch { .. } => false,
            DownloadError::InvalidUrl { .. } => false,
            DownloadError::MalformedManifest { .. } => false,
            DownloadError::ManifestDecode { .. } => false,
            DownloadError::InvalidResponse { .. } => false,
            DownloadError::Configuration { .. } => false,
            DownloadError::TaskFailed { .. } => false,
            DownloadError::Cancelled { .. } => false,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::HttpRequest { .. } => "http_request",
            DownloadError::NetworkTimeout { .. } => "network_timeout",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::ChecksumMismatch { .. } => "checksum_mismatch",
            DownloadError::SizeMismatch { .. } => "size_mismatch",
            DownloadError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            DownloadError::MalformedManifest { .. } => "malformed_manifest",
            DownloadError::ManifestDecode { .. } => "manifest_decode",
            DownloadError::InvalidResponse { .. } => "invalid_response",
            DownloadError::Configuration { .. } => "configuration",
            DownloadError::TaskFailed { .. } => "task_failed",
            DownloadError::Cancelled { .. } => "cancelled",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DownloadError::HttpRequest { .. } => ErrorSeverity::Medium,
            DownloadError::NetworkTimeout { .. } => ErrorSeverity::Medium,
            DownloadError::HttpStatus { .. } => ErrorSeverity::High,
            DownloadError::FileSystem { .. } => ErrorSeverity::High,
            DownloadError::InvalidUrl { .. } => ErrorSeverity::High,
            DownloadError::ChecksumMismatch { .. } => ErrorSeverity::Critical,
            DownloadError::SizeMismatch { .. } => ErrorSeverity::Critical,
            DownloadError::MaxRetriesExceeded { .. } => ErrorSeverity::High,
            DownloadError::MalformedManifest { .. } => ErrorSeverity::Critical,
            DownloadError::ManifestDecode { .. } => ErrorSeverity::Critical,
            DownloadError::InvalidResponse { .. } => ErrorSeverity::High,
            DownloadError::Configuration { .. } => ErrorSeverity::High,
            DownloadError::TaskFailed { .. } => ErrorSeverity::High,
            DownloadError::Cancelled { .. } => ErrorSeverity::Low,
        }
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            DownloadError::NetworkTimeout { .. } => {
                Some("Check your internet connection or try increasing the timeout value")
            }
            DownloadError::HttpStatus { status: 401, .. } => {
                Some("Check that DX_API_TOKEN holds a valid, unexpired token")
            }
            DownloadError::InvalidUrl { suggestion, .. } => Some(suggestion),
            DownloadError::ChecksumMismatch { .. } => {
                Some("The remote object changed or was corrupted in transit; regenerate the manifest and retry the file")
            }
            DownloadError::MalformedManifest { .. } => {
                Some("Regenerate the manifest; part indices must be contiguous integers starting at 1")
            }
            DownloadError::Configuration { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }

    /// Build a filesystem error bound to a path
    pub fn file_system<P: Into<PathBuf>>(path: P, operation: FileOperation, source: std::io::Error) -> Self {
        DownloadError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        DownloadError::MalformedManifest { reason: reason.into() }
    }
}

/// Statuses the platform treats as transient: 429 and every 5xx except 501
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (status >= 500 && status != 501)
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<serde_json::Error> for DownloadError {
    fn from(error: serde_json::Error) -> Self {
        DownloadError::ManifestDecode {
            reason: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}
