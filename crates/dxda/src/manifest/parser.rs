//! Manifest decoding
//!
//! Manifests are usually shipped bzip2-compressed (`manifest.json.bz2`), but
//! gzip and plain JSON are accepted too. The format is detected from the
//! leading magic bytes, not the file extension.

use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::downloader::core::error::{DownloadError, FileOperation, Result};
use crate::manifest::model::Manifest;

const BZIP2_MAGIC: &[u8] = b"BZh";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

/// Container format detected from a manifest's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestEncoding {
    Bzip2,
    Gzip,
    Json,
}

impl ManifestEncoding {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(BZIP2_MAGIC) {
            ManifestEncoding::Bzip2
        } else if bytes.starts_with(GZIP_MAGIC) {
            ManifestEncoding::Gzip
        } else {
            ManifestEncoding::Json
        }
    }
}

impl Manifest {
    /// Parse and validate plain JSON manifest bytes
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Decompress if needed, then parse and validate
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let encoding = ManifestEncoding::detect(bytes);
        debug!("Decoding manifest as {:?} ({} bytes)", encoding, bytes.len());

        match encoding {
            ManifestEncoding::Json => Self::from_json_slice(bytes),
            ManifestEncoding::Bzip2 => {
                let json = decompress(bzip2::read::BzDecoder::new(bytes), "bzip2")?;
                Self::from_json_slice(&json)
            }
            ManifestEncoding::Gzip => {
                let json = decompress(flate2::read::GzDecoder::new(bytes), "gzip")?;
                Self::from_json_slice(&json)
            }
        }
    }
}

fn decompress<R: Read>(mut reader: R, format: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).map_err(|e| DownloadError::ManifestDecode {
        reason: format!("{} decompression failed: {}", format, e),
        source: Some(Box::new(e)),
    })?;
    Ok(out)
}

/// Read, decode and validate a manifest file
///
/// Any structural problem fails the whole load before a single byte is
/// downloaded.
pub async fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await
        .map_err(|e| DownloadError::file_system(path, FileOperation::Read, e))?;

    let manifest = Manifest::decode(&bytes)?;
    info!(
        "Loaded manifest {}: {} projects, {} files, {} parts, {} bytes",
        path.display(),
        manifest.projects.len(),
        manifest.file_count(),
        manifest.part_count(),
        manifest.total_size()
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"{
        "project-B5Ykq8Q0Yb4Z1pvXgF1X8fKB": [
            {
                "folder": "/reads",
                "id": "file-FGqFk9j0Yb4yq2Ff6Zy1Xz9K",
                "name": "sample.fastq",
                "parts": {
                    "1": {"md5": "65a8e27d8879283831b664bd8b7f0ad4", "size": 13},
                    "2": {"md5": "D41D8CD98F00B204E9800998ECF8427E", "size": 0}
                }
            }
        ]
    }"#;

    fn gzip_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn bzip2_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn plain_json_manifest_decodes() {
        let manifest = Manifest::decode(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.file_count(), 1);

        let (project, file) = manifest.iter_files().next().unwrap();
        assert_eq!(project, "project-B5Ykq8Q0Yb4Z1pvXgF1X8fKB");
        assert_eq!(file.name, "sample.fastq");
        assert_eq!(file.total_size(), 13);
    }

    #[test]
    fn compressed_manifests_decode_to_the_same_content() {
        let plain = Manifest::decode(MANIFEST.as_bytes()).unwrap();

        let gz = gzip_compress(MANIFEST.as_bytes());
        assert_eq!(ManifestEncoding::detect(&gz), ManifestEncoding::Gzip);
        assert_eq!(Manifest::decode(&gz).unwrap(), plain);

        let bz = bzip2_compress(MANIFEST.as_bytes());
        assert_eq!(ManifestEncoding::detect(&bz), ManifestEncoding::Bzip2);
        assert_eq!(Manifest::decode(&bz).unwrap(), plain);
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(
            Manifest::decode(b"{not json"),
            Err(DownloadError::ManifestDecode { .. })
        ));
    }

    #[test]
    fn truncated_bzip2_is_a_decode_error() {
        let bz = bzip2_compress(MANIFEST.as_bytes());
        assert!(Manifest::decode(&bz[..bz.len() / 2]).is_err());
    }

    #[test]
    fn structurally_invalid_manifest_fails_whole_load() {
        let json = r#"{"project-1": [
            {"folder": "/", "id": "file-1", "name": "ok", "parts": {"1": {"md5": "d41d8cd98f00b204e9800998ecf8427e", "size": 0}}},
            {"folder": "/", "id": "file-2", "name": "bad", "parts": {}}
        ]}"#;
        assert!(matches!(
            Manifest::decode(json.as_bytes()),
            Err(DownloadError::MalformedManifest { .. })
        ));
    }

    #[tokio::test]
    async fn read_manifest_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json.bz2");
        tokio::fs::write(&path, bzip2_compress(MANIFEST.as_bytes())).await.unwrap();

        let manifest = read_manifest(&path).await.unwrap();
        assert_eq!(manifest.part_count(), 2);
    }

    #[tokio::test]
    async fn missing_manifest_is_a_filesystem_error() {
        let dir = tempdir().unwrap();
        let result = read_manifest(dir.path().join("absent.json")).await;
        assert!(matches!(
            result,
            Err(DownloadError::FileSystem { operation: FileOperation::Read, .. })
        ));
    }
}
