//! Platform API client
//!
//! Every platform route is an authenticated `POST <api>/<route>` with a JSON
//! body. The downloader only needs two of them: `<file-id>/download`, which
//! returns a short-lived signed URL plus the headers to send with it, and
//! `system/whoami` for checking a token.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::downloader::core::http::{HttpRequest, RequestClient};
use crate::downloader::core::{DownloadError, Result};

/// Signed location of a file's content
///
/// Obtained once per file and shared read-only by all of that file's parts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadUrl {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Identity behind a token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhoAmI {
    pub id: String,
}

/// Thin client for the platform API routes used by the downloader
#[derive(Clone)]
pub struct DxApi {
    client: Arc<dyn RequestClient>,
    base_url: String,
}

impl DxApi {
    pub fn new<S: Into<String>>(client: Arc<dyn RequestClient>, base_url: S) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON payload to `<api>/<route>` and return the raw response body
    pub async fn api_call(&self, token: &str, route: &str, payload: &str) -> Result<Vec<u8>> {
        if token.trim().is_empty() {
            return Err(DownloadError::Configuration {
                message: "API token is empty".to_string(),
                field: Some("token".to_string()),
                suggestion: Some("Set DX_API_TOKEN or log in with the platform CLI".to_string()),
            });
        }

        let url = format!("{}/{}", self.base_url, route.trim_start_matches('/'));
        let request = HttpRequest::post(url)
            .with_header("Authorization", &format!("Bearer {}", token.trim()))?
            .with_header("Content-Type", "application/json")?
            .with_body(payload.as_bytes().to_vec());

        let response = self.client.send(request).await?;
        Ok(response.body)
    }

    /// Resolve the signed download URL for a file
    ///
    /// Fails before any request is made when `file_id` or `token` is empty.
    pub async fn resolve_download_url(&self, file_id: &str, token: &str) -> Result<DownloadUrl> {
        if file_id.trim().is_empty() {
            return Err(DownloadError::Configuration {
                message: "file ID is empty".to_string(),
                field: Some("file_id".to_string()),
                suggestion: None,
            });
        }

        let route = format!("{}/download", file_id);
        let body = self.api_call(token, &route, "{}").await?;
        let download_url: DownloadUrl = serde_json::from_slice(&body).map_err(|e| DownloadError::InvalidResponse {
            url: format!("{}/{}", self.base_url, route),
            reason: format!("expected {{url, headers}}: {}", e),
        })?;

        debug!("Resolved download URL for {} ({} extra headers)", file_id, download_url.headers.len());
        Ok(download_url)
    }

    /// Identify the user or job the token belongs to
    pub async fn whoami(&self, token: &str) -> Result<WhoAmI> {
        let body = self.api_call(token, "system/whoami", "{}").await?;
        serde_json::from_slice(&body).map_err(|e| DownloadError::InvalidResponse {
            url: format!("{}/system/whoami", self.base_url),
            reason: e.to_string(),
        })
    }
}
