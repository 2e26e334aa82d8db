//! Part fetcher: one ranged GET, verified, written at its offset

use tracing::debug;

use crate::downloader::api::DownloadUrl;
use crate::downloader::core::files::PartWriter;
use crate::downloader::core::http::{HttpRequest, RequestClient};
use crate::downloader::core::validation::PartValidation;
use crate::downloader::core::{DownloadError, Result};
use crate::manifest::{DxFile, PartRange};

/// Build the ranged GET for one part
///
/// Resolved headers are copied as-is except `Range`, which always carries the
/// locally computed byte range.
pub fn part_request(download_url: &DownloadUrl, project: &str, range: &PartRange) -> Result<HttpRequest> {
    let mut request = HttpRequest::get(format!("{}/{}", download_url.url, project));

    for (name, value) in &download_url.headers {
        if name.eq_ignore_ascii_case("range") {
            continue;
        }
        request = request.with_header(name, value)?;
    }

    if let Some(range_header) = range.http_range() {
        request = request.with_header("Range", &range_header)?;
    }
    Ok(request)
}

/// Fetch, verify and write one part; returns the bytes written
///
/// Nothing is written unless the body's MD5 matches the manifest. Empty parts
/// are verified against the empty digest without a request.
pub async fn fetch_part(
    client: &dyn RequestClient,
    file: &DxFile,
    download_url: &DownloadUrl,
    project: &str,
    range: &PartRange,
    writer: PartWriter,
) -> Result<u64> {
    let part = file.part(range.index).ok_or_else(|| {
        DownloadError::malformed(format!("file {} has no part {}", file.id, range.index))
    })?;
    let validation = PartValidation::for_part(range.index, part);

    if range.length == 0 {
        validation.verify(writer.path(), &[])?;
        return Ok(0);
    }

    let request = part_request(download_url, project, range)?;
    debug!("Fetching part {} of {} ({} bytes at offset {})",
           range.index, file.id, range.length, range.offset);

    let response = client.send(request).await?;
    let body = validation.verify_async(writer.path(), response.body).await?;
    writer.write(body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn download_url(headers: &[(&str, &str)]) -> DownloadUrl {
        DownloadUrl {
            url: "https://dl.example.com/F/D/abc".to_string(),
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn request_targets_url_slash_project() {
        let range = PartRange { index: 2, offset: 10, length: 10 };
        let request = part_request(&download_url(&[]), "project-1", &range).unwrap();
        assert_eq!(request.url, "https://dl.example.com/F/D/abc/project-1");
        assert_eq!(request.headers.get("Range").unwrap(), "bytes=10-19");
    }

    #[test]
    fn local_range_wins_over_resolved_range() {
        let range = PartRange { index: 1, offset: 0, length: 5 };
        let url = download_url(&[("range", "bytes=0-999"), ("X-Signed", "sig")]);
        let request = part_request(&url, "project-1", &range).unwrap();

        assert_eq!(request.headers.get("Range").unwrap(), "bytes=0-4");
        assert_eq!(request.headers.get_all("Range").iter().count(), 1);
        assert_eq!(request.headers.get("X-Signed").unwrap(), "sig");
    }
}
