//! Progress tracking and reporting for download operations

use std::path::Path;
use std::sync::Arc;

/// Progress callback for download operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during download operations
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FileStarted {
        file_id: String,
        path: String,
        parts: usize,
        total_size: u64,
    },
    PartComplete {
        file_id: String,
        part: u32,
        bytes: u64,
    },
    PartFailed {
        file_id: String,
        part: u32,
        error: String,
    },
    FileComplete {
        file_id: String,
        path: String,
        final_size: u64,
    },
    FileFailed {
        file_id: String,
        path: String,
        error: String,
    },
    RetryAttempt {
        url: String,
        attempt: usize,
        max_attempts: usize,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_file_started(&self, _file_id: &str, _path: &str, _parts: usize, _total_size: u64) {}
    fn on_part_complete(&self, _file_id: &str, _part: u32, _bytes: u64) {}
    fn on_part_failed(&self, _file_id: &str, _part: u32, _error: &str) {}
    fn on_file_complete(&self, _file_id: &str, _path: &str, _final_size: u64) {}
    fn on_file_failed(&self, _file_id: &str, _path: &str, _error: &str) {}
    fn on_retry_attempt(&self, _url: &str, _attempt: usize, _max_attempts: usize) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::FileStarted { file_id, path, parts, total_size } => {
                self.on_file_started(&file_id, &path, parts, total_size);
            }
            ProgressEvent::PartComplete { file_id, part, bytes } => {
                self.on_part_complete(&file_id, part, bytes);
            }
            ProgressEvent::PartFailed { file_id, part, error } => {
                self.on_part_failed(&file_id, part, &error);
            }
            ProgressEvent::FileComplete { file_id, path, final_size } => {
                self.on_file_complete(&file_id, &path, final_size);
            }
            ProgressEvent::FileFailed { file_id, path, error } => {
                self.on_file_failed(&file_id, &path, &error);
            }
            ProgressEvent::RetryAttempt { url, attempt, max_attempts } => {
                self.on_retry_attempt(&url, attempt, max_attempts);
            }
        })
    }
}

/// Emit an event if a callback is installed
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_file_started(&self, _file_id: &str, path: &str, parts: usize, total_size: u64) {
        println!("📥 {} ({} parts, {:.1} MB)", display_name(path), parts, total_size as f64 / 1_048_576.0);
    }

    fn on_part_complete(&self, file_id: &str, part: u32, bytes: u64) {
        if self.verbose {
            println!("   part {} of {} verified ({} bytes)", part, file_id, bytes);
        }
    }

    fn on_part_failed(&self, file_id: &str, part: u32, error: &str) {
        eprintln!("   part {} of {} failed: {}", part, file_id, error);
    }

    fn on_file_complete(&self, _file_id: &str, path: &str, final_size: u64) {
        println!("✅ {} ({} bytes)", path, final_size);
    }

    fn on_file_failed(&self, _file_id: &str, path: &str, error: &str) {
        eprintln!("❌ {}: {}", path, error);
    }

    fn on_retry_attempt(&self, url: &str, attempt: usize, max_attempts: usize) {
        if self.verbose {
            println!("🔄 Retry {}/{} for {}", attempt, max_attempts, url);
        }
    }
}

fn display_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// No-op progress reporter
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Fans every event out to several reporters
#[derive(Default)]
pub struct CompositeProgressReporter {
    reporters: Vec<Box<dyn ProgressReporter>>,
}

impl CompositeProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl ProgressReporter for CompositeProgressReporter {
    fn on_file_started(&self, file_id: &str, path: &str, parts: usize, total_size: u64) {
        for reporter in &self.reporters {
            reporter.on_file_started(file_id, path, parts, total_size);
        }
    }

    fn on_part_complete(&self, file_id: &str, part: u32, bytes: u64) {
        for reporter in &self.reporters {
            reporter.on_part_complete(file_id, part, bytes);
        }
    }

    fn on_part_failed(&self, file_id: &str, part: u32, error: &str) {
        for reporter in &self.reporters {
            reporter.on_part_failed(file_id, part, error);
        }
    }

    fn on_file_complete(&self, file_id: &str, path: &str, final_size: u64) {
        for reporter in &self.reporters {
            reporter.on_file_complete(file_id, path, final_size);
        }
    }

    fn on_file_failed(&self, file_id: &str, path: &str, error: &str) {
        for reporter in &self.reporters {
            reporter.on_file_failed(file_id, path, error);
        }
    }

    fn on_retry_attempt(&self, url: &str, attempt: usize, max_attempts: usize) {
        for reporter in &self.reporters {
            reporter.on_retry_attempt(url, attempt, max_attempts);
        }
    }
}
