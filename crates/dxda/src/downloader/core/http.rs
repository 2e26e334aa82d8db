//! Reliable request client
//!
//! Wraps a `reqwest` client with the platform's retry policy: connection
//! failures, timeouts, 429 and 5xx responses are retried with bounded
//! exponential backoff; everything else is reported to the caller as a
//! definitive failure.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::{
    DownloadError, DownloadMetrics, ProgressCallback, ProgressEvent, Result,
};

/// A single HTTP request as seen by the engine
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn get<S: Into<String>>(url: S) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post<S: Into<String>>(url: S) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header, replacing any previous value with the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Anything that can deliver a request with a definitive outcome
///
/// Retries, if any, happen behind this boundary. Callers only ever see a 2xx
/// response or a final error.
#[async_trait]
pub trait RequestClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Convert a textual header pair into typed header parts
pub fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| DownloadError::Configuration {
        message: format!("invalid header name '{}': {}", name, e),
        field: Some("headers".to_string()),
        suggestion: None,
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| DownloadError::Configuration {
        message: format!("invalid value for header '{}': {}", name, e),
        field: Some("headers".to_string()),
        suggestion: None,
    })?;
    Ok((header_name, header_value))
}

/// HTTP client with the platform retry policy built in
#[derive(Clone)]
pub struct ReliableClient {
    client: Client,
    config: DownloadConfig,
    metrics: Option<Arc<DownloadMetrics>>,
    progress_callback: Option<ProgressCallback>,
}

impl ReliableClient {
    /// Create a new client from download configuration
    ///
    /// `config.timeout` bounds connecting and each read of the response, not
    /// the whole transfer, so a large part that keeps streaming never times out.
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DownloadError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                field: None,
                suggestion: None,
            })?;

        Ok(Self {
            client,
            config: config.clone(),
            metrics: None,
            progress_callback: None,
        })
    }

    /// Count retries into shared metrics
    pub fn with_metrics(mut self, metrics: Arc<DownloadMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report retry attempts as progress events
    pub fn with_progress(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self.client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&request.url, e))?;

        let status = response.status();
        let body = response.bytes().await
            .map_err(|e| self.transport_error(&request.url, e))?;

        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                method: request.method.to_string(),
                url: request.url.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).chars().take(512).collect(),
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }

    fn transport_error(&self, url: &str, error: reqwest::Error) -> DownloadError {
        if error.is_timeout() {
            DownloadError::NetworkTimeout {
                url: url.to_string(),
                duration_secs: self.config.timeout.as_secs(),
            }
        } else {
            DownloadError::HttpRequest {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

#[async_trait]
impl RequestClient for ReliableClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("{} {}", request.method, request.url);
        let metrics = self.metrics.clone();
        let callback = self.progress_callback.clone();
        retry_with_backoff(
            || self.send_once(&request),
            &self.config,
            move |attempt, max_attempts, url| {
                if let Some(ref metrics) = metrics {
                    metrics.record_retry();
                }
                if let Some(ref callback) = callback {
                    callback(ProgressEvent::RetryAttempt {
                        url: url.to_string(),
                        attempt,
                        max_attempts,
                    });
                }
            },
            &request.url,
        ).await
    }
}

/// Run `operation` until it succeeds, fails unrecoverably, or retries run out
///
/// Exhausting retries on a status error returns that status error; exhausting
/// them on a transport error returns `MaxRetriesExceeded`.
pub async fn retry_with_backoff<F, T, Fut, R>(
    mut operation: F,
    config: &DownloadConfig,
    mut on_retry: R,
    url: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(usize, usize, &str),
{
    let started = Instant::now();
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.get_retry_delay(attempt - 1);
            debug!("Retry attempt {} for {} after {:?} delay", attempt, url, delay);
            on_retry(attempt, config.max_retries, url);
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_recoverable() {
                    debug!("Error is not recoverable, failing immediately: {}", e);
                    return Err(e);
                }
                warn!("Attempt {} of {} for {} failed: {}", attempt + 1, config.max_retries + 1, url, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e @ DownloadError::HttpStatus { .. }) => Err(e),
        Some(e) => Err(DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            max_retries: config.max_retries,
            total_duration_secs: started.elapsed().as_secs(),
            last_error: e.to_string(),
        }),
        None => Err(DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            max_retries: config.max_retries,
            total_duration_secs: started.elapsed().as_secs(),
            last_error: "no attempt was made".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: usize) -> DownloadConfig {
        DownloadConfig::builder()
            .max_retries(max_retries)
            .retry_delay(Duration::from_millis(1))
            .max_retry_delay(Duration::from_millis(2))
            .build()
    }

    fn status_error(status: u16) -> DownloadError {
        DownloadError::HttpStatus {
            method: "GET".to_string(),
            url: "http://example.invalid".to_string(),
            status,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let retries = AtomicUsize::new(0);
        let result = retry_with_backoff(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status_error(503))
                } else {
                    Ok(42)
                }
            },
            &fast_config(3),
            |_, _, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
            "http://example.invalid",
        ).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status_error(404))
            },
            &fast_config(5),
            |_, _, _| {},
            "http://example.invalid",
        ).await;

        assert!(matches!(result, Err(DownloadError::HttpStatus { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_status_retries_surface_final_status() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(status_error(500))
            },
            &fast_config(2),
            |_, _, _| {},
            "http://example.invalid",
        ).await;

        assert!(matches!(result, Err(DownloadError::HttpStatus { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_timeouts_become_max_retries_exceeded() {
        let result: Result<()> = retry_with_backoff(
            || async {
                Err(DownloadError::NetworkTimeout {
                    url: "http://example.invalid".to_string(),
                    duration_secs: 1,
                })
            },
            &fast_config(1),
            |_, _, _| {},
            "http://example.invalid",
        ).await;

        match result {
            Err(DownloadError::MaxRetriesExceeded { max_retries, .. }) => assert_eq!(max_retries, 1),
            other => panic!("Expected MaxRetriesExceeded, got {:?}", other),
        }
    }

    #[test]
    fn with_header_replaces_existing_value() {
        let request = HttpRequest::get("http://example.invalid")
            .with_header("Range", "bytes=0-9").unwrap()
            .with_header("range", "bytes=10-19").unwrap();
        assert_eq!(request.headers.get("Range").unwrap(), "bytes=10-19");
        assert_eq!(request.headers.len(), 1);
    }

    /// Serve one response whose body arrives in `chunks` pieces, `gap` apart
    async fn trickle_server(chunks: usize, gap: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", chunks * 4);
            socket.write_all(header.as_bytes()).await.unwrap();
            for _ in 0..chunks {
                tokio::time::sleep(gap).await;
                if socket.write_all(b"data").await.is_err() {
                    return;
                }
                socket.flush().await.unwrap();
            }
        });
        format!("http://{}/part", addr)
    }

    #[tokio::test]
    async fn body_streaming_longer_than_timeout_still_succeeds() {
        let config = DownloadConfig::builder()
            .max_retries(0)
            .timeout(Duration::from_millis(400))
            .build();
        let client = ReliableClient::from_config(&config).unwrap();
        let url = trickle_server(6, Duration::from_millis(150)).await;

        let started = Instant::now();
        let response = client.send(HttpRequest::get(&url)).await.unwrap();
        assert!(started.elapsed() > Duration::from_millis(400));
        assert_eq!(response.body, b"data".repeat(6));
    }

    #[tokio::test]
    async fn stalled_body_is_a_transport_failure() {
        let config = DownloadConfig::builder()
            .max_retries(0)
            .timeout(Duration::from_millis(200))
            .build();
        let client = ReliableClient::from_config(&config).unwrap();
        let url = trickle_server(2, Duration::from_secs(2)).await;

        let result = client.send(HttpRequest::get(&url)).await;
        assert!(result.is_err());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let result = HttpRequest::get("http://example.invalid").with_header("bad header", "x");
        assert!(matches!(result, Err(DownloadError::Configuration { .. })));
    }
}
