//! Manifest run results
//!
//! A manifest run never stops at the first failed file; every file gets an
//! outcome and the caller decides what a partial success means.

use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::core::{DownloadError, DownloadMetricsSnapshot};
use crate::downloader::file::FileDownload;

/// Result of downloading one manifest file
#[derive(Debug)]
pub struct FileOutcome {
    pub project: String,
    pub file_id: String,
    pub name: String,
    /// Local destination, whether or not the download succeeded
    pub path: PathBuf,
    pub result: Result<FileDownload, DownloadError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&DownloadError> {
        self.result.as_ref().err()
    }
}

/// Result of a whole manifest run
#[derive(Debug)]
pub struct ManifestReport {
    /// One entry per manifest file, in manifest order
    pub outcomes: Vec<FileOutcome>,
    /// Total time taken for the run
    pub duration: Duration,
    pub metrics: DownloadMetricsSnapshot,
}

impl ManifestReport {
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when every file downloaded and verified
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|d| d.bytes)
            .sum()
    }
}
