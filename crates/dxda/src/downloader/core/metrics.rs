//! Download statistics shared across concurrent file and part tasks

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from every task of a manifest run
#[derive(Debug, Default)]
pub struct DownloadMetrics {
    pub total_bytes: AtomicU64,
    pub files_started: AtomicU64,
    pub files_completed: AtomicU64,
    pub files_failed: AtomicU64,
    pub parts_completed: AtomicU64,
    pub parts_failed: AtomicU64,
    pub checksum_failures: AtomicU64,
    pub retries_attempted: AtomicU64,
}

impl DownloadMetrics {
    pub fn record_file_started(&self) {
        self.files_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verified part and the bytes it wrote
    pub fn record_part_completed(&self, bytes: u64) {
        self.parts_completed.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_part_failed(&self) {
        self.parts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            files_started: self.files_started.load(Ordering::Relaxed),
            files_completed: self.files_completed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            parts_completed: self.parts_completed.load(Ordering::Relaxed),
            parts_failed: self.parts_failed.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            retries_attempted: self.retries_attempted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of download metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadMetricsSnapshot {
    pub total_bytes: u64,
    pub files_started: u64,
    pub files_completed: u64,
    pub files_failed: u64,
    pub parts_completed: u64,
    pub parts_failed: u64,
    pub checksum_failures: u64,
    pub retries_attempted: u64,
}

impl DownloadMetricsSnapshot {
    /// Fraction of started files that completed (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.files_started == 0 {
            0.0
        } else {
            self.files_completed as f64 / self.files_started as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = DownloadMetrics::default();
        metrics.record_file_started();
        metrics.record_file_started();
        metrics.record_part_completed(10);
        metrics.record_part_completed(5);
        metrics.record_part_failed();
        metrics.record_checksum_failure();
        metrics.record_file_completed();
        metrics.record_file_failed();
        metrics.record_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_bytes, 15);
        assert_eq!(snapshot.parts_completed, 2);
        assert_eq!(snapshot.parts_failed, 1);
        assert_eq!(snapshot.checksum_failures, 1);
        assert_eq!(snapshot.retries_attempted, 1);
        assert_eq!(snapshot.success_rate(), 0.5);
    }

    #[test]
    fn success_rate_of_empty_run_is_zero() {
        assert_eq!(DownloadMetrics::default().snapshot().success_rate(), 0.0);
    }
}
