//! Main entry point for manifest downloads
//!
//! The call chain flows as follows:
//!
//! User Code
//! ↓
//! Downloader (this file)
//! ↓
//! FileDownloader (file.rs): one resolved URL per file
//! ↓
//! fetch_part (part.rs): one task per part
//! ↓
//! ReliableClient (core/http.rs)

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::downloader::api::DxApi;
use crate::downloader::batch::{FileOutcome, ManifestReport};
use crate::downloader::config::DownloadConfig;
use crate::downloader::core::http::{ReliableClient, RequestClient};
use crate::downloader::core::{DownloadMetrics, ProgressCallback, Result};
use crate::downloader::file::{FileDownload, FileDownloader};
use crate::manifest::{DxFile, Manifest};

/// Downloads manifests and single manifest files
///
/// Holds the request client, configuration and shared metrics. Files are
/// written beneath the output root, which defaults to the current directory.
pub struct Downloader {
    client: Arc<dyn RequestClient>,
    config: DownloadConfig,
    output_root: PathBuf,
    metrics: Arc<DownloadMetrics>,
    progress: Option<ProgressCallback>,
    /// Whether `client` is the built-in `ReliableClient` (rebuilt to report retries)
    default_client: bool,
}

impl Downloader {
    /// Create a downloader backed by the retrying HTTP client
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        let metrics = Arc::new(DownloadMetrics::default());
        let client = ReliableClient::from_config(&config)?.with_metrics(Arc::clone(&metrics));
        Ok(Self {
            client: Arc::new(client),
            config,
            output_root: PathBuf::from("."),
            metrics,
            progress: None,
            default_client: true,
        })
    }

    /// Create a downloader with a custom request client
    pub fn with_client(client: Arc<dyn RequestClient>, config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            output_root: PathBuf::from("."),
            metrics: Arc::new(DownloadMetrics::default()),
            progress: None,
            default_client: false,
        })
    }

    pub fn with_output_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.output_root = root.into();
        self
    }

    /// Install a progress callback for file, part and retry events
    ///
    /// Retry events are only reported by the built-in client.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Result<Self> {
        if self.default_client {
            let client = ReliableClient::from_config(&self.config)?
                .with_metrics(Arc::clone(&self.metrics))
                .with_progress(Some(Arc::clone(&callback)));
            self.client = Arc::new(client);
        }
        self.progress = Some(callback);
        Ok(self)
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Get access to built-in download metrics
    pub fn metrics(&self) -> &DownloadMetrics {
        &self.metrics
    }

    /// Platform API client sharing this downloader's request client
    pub fn api(&self) -> DxApi {
        DxApi::new(Arc::clone(&self.client), self.config.api_base_url.clone())
    }

    fn file_downloader(&self) -> FileDownloader {
        FileDownloader::new(
            Arc::clone(&self.client),
            self.config.clone(),
            self.output_root.clone(),
            Arc::clone(&self.metrics),
            self.progress.clone(),
        )
    }

    /// Download one file of `project` into `<root>/<folder>/<name>`
    pub async fn download_file(&self, file: &DxFile, project: &str, token: &str) -> Result<FileDownload> {
        self.file_downloader().download_file(file, project, token).await
    }

    /// Download every file of every project
    ///
    /// The manifest is validated first; a malformed one is returned as
    /// `MalformedManifest` before any request is made. After that a failed
    /// file never stops the others. Up to `max_concurrent_files` files are in
    /// flight at once; outcomes are reported in manifest order.
    pub async fn download_manifest(&self, manifest: &Manifest, token: &str) -> Result<ManifestReport> {
        manifest.validate()?;
        let started = Instant::now();
        let files = self.file_downloader();
        let max_concurrent = self.config.max_concurrent_files.max(1);

        info!(
            "Downloading {} files ({} bytes) with up to {} files in flight",
            manifest.file_count(),
            manifest.total_size(),
            max_concurrent
        );

        let outcomes: Vec<FileOutcome> = stream::iter(manifest.iter_files())
            .map(|(project, file)| {
                let files = &files;
                async move {
                    let result = files.download_file(file, project, token).await;
                    if let Err(ref e) = result {
                        warn!("Failed to download {} ({}): {}", file.name, file.id, e);
                    }
                    FileOutcome {
                        project: project.to_string(),
                        file_id: file.id.clone(),
                        name: file.name.clone(),
                        path: file.local_path(files.output_root()),
                        result,
                    }
                }
            })
            .buffered(max_concurrent)
            .collect()
            .await;

        let report = ManifestReport {
            outcomes,
            duration: started.elapsed(),
            metrics: self.metrics.snapshot(),
        };
        info!(
            "Manifest finished in {:.1}s: {} succeeded, {} failed",
            report.duration.as_secs_f64(),
            report.successful(),
            report.failed()
        );
        Ok(report)
    }
}
