//! Configuration types for the downloader system

use std::time::Duration;

use crate::downloader::core::{DownloadError, Result};

/// Default platform API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.dnanexus.com";

/// Configuration for download operations
///
/// Every timing and concurrency knob used by the engine lives here so that
/// tests can inject fast-failing settings instead of patching globals.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Retries after the first attempt for a single HTTP request
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
    /// Connect timeout and longest stall allowed while reading a response
    pub timeout: Duration,
    pub user_agent: String,
    /// Base URL of the platform API (`<base>/<file-id>/download`)
    pub api_base_url: String,
    /// Upper bound on part fetches in flight for one file (0 = one task per part, unbounded)
    pub max_concurrent_parts: usize,
    /// Files downloaded at once by the manifest orchestrator
    pub max_concurrent_files: usize,
    /// Cancel in-flight sibling parts once one part of the same file fails
    pub cancel_on_part_failure: bool,
    /// Pre-size destination files to their final length before parts land
    pub preallocate: bool,
}

impl DownloadConfig {
    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn get_retry_delay(&self, attempt: usize) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.min(32) as u32);
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::new()
    }

    /// Reject settings that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(DownloadError::Configuration {
                message: "max_concurrent_files must be at least 1".to_string(),
                field: Some("max_concurrent_files".to_string()),
                suggestion: Some("Use 1 for sequential file downloads".to_string()),
            });
        }
        if self.retry_delay > self.max_retry_delay {
            return Err(DownloadError::Configuration {
                message: format!(
                    "retry_delay ({:?}) exceeds max_retry_delay ({:?})",
                    self.retry_delay, self.max_retry_delay
                ),
                field: Some("retry_delay".to_string()),
                suggestion: None,
            });
        }
        url::Url::parse(&self.api_base_url).map_err(|e| DownloadError::InvalidUrl {
            url: self.api_base_url.clone(),
            suggestion: "API base URL must be absolute, e.g. https://api.dnanexus.com".to_string(),
            source: e,
        })?;
        Ok(())
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            user_agent: format!("dxda/{}", env!("CARGO_PKG_VERSION")),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_concurrent_parts: 0,
            max_concurrent_files: 1,
            cancel_on_part_failure: false,
            preallocate: true,
        }
    }
}

/// Fluent builder for [`DownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_concurrent_parts(mut self, max: usize) -> Self {
        self.config.max_concurrent_parts = max;
        self
    }

    pub fn max_concurrent_files(mut self, max: usize) -> Self {
        self.config.max_concurrent_files = max;
        self
    }

    pub fn cancel_on_part_failure(mut self, cancel: bool) -> Self {
        self.config.cancel_on_part_failure = cancel;
        self
    }

    pub fn preallocate(mut self, preallocate: bool) -> Self {
        self.config.preallocate = preallocate;
        self
    }

    pub fn build(self) -> DownloadConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_platform_client() {
        let config = DownloadConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.max_retry_delay, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_files, 1);
        assert!(!config.cancel_on_part_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let config = DownloadConfig::default();
        assert_eq!(config.get_retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.get_retry_delay(1), Duration::from_secs(2));
        assert_eq!(config.get_retry_delay(4), Duration::from_secs(16));
        assert_eq!(config.get_retry_delay(5), Duration::from_secs(30));
        assert_eq!(config.get_retry_delay(100), Duration::from_secs(30));
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let config = DownloadConfig::builder()
            .api_base_url("http://localhost:8080/")
            .max_concurrent_parts(4)
            .build();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.max_concurrent_parts, 4);
    }

    #[test]
    fn validate_rejects_zero_file_concurrency() {
        let config = DownloadConfig::builder().max_concurrent_files(0).build();
        assert!(matches!(config.validate(), Err(DownloadError::Configuration { .. })));
    }
}
