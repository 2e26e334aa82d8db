//! File download orchestration
//!
//! A file is downloaded by resolving its signed URL once, creating the
//! destination, and fanning out one task per part. The file succeeds only if
//! every part was fetched, verified and written; otherwise the first failing
//! part (by index) is reported and the partial file is left on disk.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

use crate::downloader::api::DxApi;
use crate::downloader::config::DownloadConfig;
use crate::downloader::core::files::DestinationFile;
use crate::downloader::core::http::RequestClient;
use crate::downloader::core::progress::emit;
use crate::downloader::core::{DownloadError, DownloadMetrics, ProgressCallback, ProgressEvent, Result};
use crate::downloader::part::fetch_part;
use crate::manifest::DxFile;

/// A successfully downloaded and verified file
#[derive(Debug, Clone, PartialEq)]
pub struct FileDownload {
    pub file_id: String,
    pub project: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub parts: usize,
    pub duration: Duration,
}

/// Downloads single files; shared by every file task of a manifest run
#[derive(Clone)]
pub struct FileDownloader {
    client: Arc<dyn RequestClient>,
    api: DxApi,
    config: DownloadConfig,
    output_root: PathBuf,
    metrics: Arc<DownloadMetrics>,
    progress: Option<ProgressCallback>,
}

impl FileDownloader {
    pub fn new(
        client: Arc<dyn RequestClient>,
        config: DownloadConfig,
        output_root: PathBuf,
        metrics: Arc<DownloadMetrics>,
        progress: Option<ProgressCallback>,
    ) -> Self {
        let api = DxApi::new(Arc::clone(&client), config.api_base_url.clone());
        Self { client, api, config, output_root, metrics, progress }
    }

    pub fn api(&self) -> &DxApi {
        &self.api
    }

    pub fn output_root(&self) -> &std::path::Path {
        &self.output_root
    }

    /// Download every part of `file` into `<root>/<folder>/<name>`
    pub async fn download_file(&self, file: &DxFile, project: &str, token: &str) -> Result<FileDownload> {
        let path = file.local_path(&self.output_root);
        let span = info_span!("file", id = %file.id, name = %file.name);

        self.metrics.record_file_started();
        emit(&self.progress, ProgressEvent::FileStarted {
            file_id: file.id.clone(),
            path: path.display().to_string(),
            parts: file.parts.len(),
            total_size: file.total_size(),
        });

        match self.run(file, project, token, path.clone()).instrument(span).await {
            Ok(download) => {
                self.metrics.record_file_completed();
                emit(&self.progress, ProgressEvent::FileComplete {
                    file_id: file.id.clone(),
                    path: path.display().to_string(),
                    final_size: download.bytes,
                });
                Ok(download)
            }
            Err(e) => {
                self.metrics.record_file_failed();
                emit(&self.progress, ProgressEvent::FileFailed {
                    file_id: file.id.clone(),
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, file: &DxFile, project: &str, token: &str, path: PathBuf) -> Result<FileDownload> {
        let started = Instant::now();
        file.validate()?;
        let ranges = file.part_ranges()?;

        let download_url = Arc::new(self.api.resolve_download_url(&file.id, token).await?);
        let destination = DestinationFile::create(&path, file.total_size(), self.config.preallocate).await?;
        info!("Downloading {} parts into {}", ranges.len(), path.display());

        let semaphore = (self.config.max_concurrent_parts > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrent_parts)));
        let cancel = CancellationToken::new();
        let shared_file = Arc::new(file.clone());
        let project: Arc<str> = Arc::from(project);

        let mut handles = Vec::with_capacity(ranges.len());
        for range in &ranges {
            let range = *range;
            let writer = destination.writer(&range);
            let client = Arc::clone(&self.client);
            let file = Arc::clone(&shared_file);
            let download_url = Arc::clone(&download_url);
            let project = Arc::clone(&project);
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let cancel_on_failure = self.config.cancel_on_part_failure;

            // A part still queued on the limiter is cancelled as soon as a sibling fails
            let task = async move {
                let fetch = async {
                    let _permit = match semaphore {
                        Some(semaphore) => Some(semaphore.acquire_owned().await.map_err(|_| DownloadError::Cancelled {
                            reason: "part limiter closed".to_string(),
                            url: None,
                        })?),
                        None => None,
                    };
                    fetch_part(client.as_ref(), &file, &download_url, &project, &range, writer).await
                };

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DownloadError::Cancelled {
                        reason: format!("part {} cancelled after a sibling part failed", range.index),
                        url: Some(download_url.url.clone()),
                    }),
                    result = fetch => result,
                };

                if result.is_err() && cancel_on_failure {
                    cancel.cancel();
                }
                result
            };
            handles.push((range.index, tokio::spawn(task.instrument(debug_span!("part", index = range.index)))));
        }

        let (indices, tasks): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(tasks).await;

        let mut bytes = 0u64;
        let mut failures: Vec<(u32, DownloadError)> = Vec::new();
        for (index, joined) in indices.into_iter().zip(results) {
            let result = joined.unwrap_or_else(|e| Err(DownloadError::TaskFailed {
                file: path.clone(),
                reason: format!("part {} task did not complete: {}", index, e),
                source: Some(Box::new(e)),
            }));

            match result {
                Ok(written) => {
                    bytes += written;
                    self.metrics.record_part_completed(written);
                    emit(&self.progress, ProgressEvent::PartComplete {
                        file_id: file.id.clone(),
                        part: index,
                        bytes: written,
                    });
                }
                Err(e) => {
                    self.metrics.record_part_failed();
                    if matches!(e, DownloadError::ChecksumMismatch { .. }) {
                        self.metrics.record_checksum_failure();
                    }
                    debug!("Part {} failed: {}", index, e);
                    emit(&self.progress, ProgressEvent::PartFailed {
                        file_id: file.id.clone(),
                        part: index,
                        error: e.to_string(),
                    });
                    failures.push((index, e));
                }
            }
        }

        if !failures.is_empty() {
            warn!("{} of {} parts failed for {}", failures.len(), ranges.len(), path.display());
            return Err(first_failure(failures));
        }

        destination.sync().await?;
        info!("Completed {} ({} bytes)", path.display(), bytes);

        Ok(FileDownload {
            file_id: file.id.clone(),
            project: project.to_string(),
            path,
            bytes,
            parts: ranges.len(),
            duration: started.elapsed(),
        })
    }
}

/// Lowest-index failure, preferring a real cause over a cancellation it triggered
fn first_failure(failures: Vec<(u32, DownloadError)>) -> DownloadError {
    let mut fallback = None;
    for (_, error) in failures {
        if !matches!(error, DownloadError::Cancelled { .. }) {
            return error;
        }
        fallback.get_or_insert(error);
    }
    fallback.unwrap_or_else(|| DownloadError::Cancelled {
        reason: "no part reported a failure".to_string(),
        url: None,
    })
}
