//! Part integrity verification

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::downloader::core::error::{DownloadError, Result};
use crate::manifest::DxPart;

/// Hex-encoded (lower-case) MD5 of a buffer
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

/// Expected integrity metadata for one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartValidation {
    pub index: u32,
    /// Expected MD5, normalised to lower-case hex
    pub md5: String,
    pub expected_size: u64,
}

impl PartValidation {
    pub fn new<S: AsRef<str>>(index: u32, md5: S, expected_size: u64) -> Self {
        Self {
            index,
            md5: md5.as_ref().trim().to_lowercase(),
            expected_size,
        }
    }

    pub fn for_part(index: u32, part: &DxPart) -> Self {
        Self::new(index, &part.md5, part.size)
    }

    /// Verify a fetched body against the expected checksum, then its length
    pub fn verify(&self, file: &Path, body: &[u8]) -> Result<()> {
        let actual = md5_hex(body);
        self.check_digest(file, &actual, body.len() as u64)
    }

    /// Verify on the blocking pool; hashing a large part would stall the runtime
    pub async fn verify_async(&self, file: &Path, body: Vec<u8>) -> Result<Vec<u8>> {
        let file_path: PathBuf = file.to_path_buf();
        let (body, actual) = tokio::task::spawn_blocking(move || {
            let digest = md5_hex(&body);
            (body, digest)
        })
        .await
        .map_err(|e| DownloadError::TaskFailed {
            file: file_path,
            reason: format!("Hash computation failed for part {}: {}", self.index, e),
            source: Some(Box::new(e)),
        })?;

        self.check_digest(file, &actual, body.len() as u64)?;
        Ok(body)
    }

    fn check_digest(&self, file: &Path, actual: &str, actual_size: u64) -> Result<()> {
        let passed = actual == self.md5;
        debug!("MD5 check for part {} of {}: expected={}, actual={}, passed={}",
               self.index, file.display(), self.md5, actual, passed);

        if !passed {
            return Err(DownloadError::ChecksumMismatch {
                file: file.to_path_buf(),
                part: self.index,
                expected: self.md5.clone(),
                actual: actual.to_string(),
            });
        }

        if actual_size != self.expected_size {
            return Err(DownloadError::SizeMismatch {
                file: file.to_path_buf(),
                part: self.index,
                expected: self.expected_size,
                actual: actual_size,
                diff: (actual_size as i128 - self.expected_size as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            });
        }

        Ok(())
    }
}
