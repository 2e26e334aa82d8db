//! Destination file handling
//!
//! The file orchestrator owns the destination handle for the whole download
//! and lends each part task a [`PartWriter`]: the shared handle plus the one
//! byte range that task may touch. Writes are positioned (`pwrite` on unix,
//! `seek_write` on windows) so concurrent parts never race on a shared cursor.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use crate::downloader::core::error::{DownloadError, FileOperation, Result};
use crate::manifest::PartRange;

/// Resolve a manifest folder + name under a local output root
///
/// Manifest folders are platform paths like `/reads/run1`; they are always
/// treated as relative to `root`.
pub fn resolve_local_path(root: &Path, folder: &str, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(folder).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path.join(name)
}

/// Ensure the directory exists; succeeds if it is already there
pub async fn ensure_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).await
        .map_err(|e| DownloadError::file_system(dir, FileOperation::CreateDir, e))?;
    Ok(())
}

/// An open destination file exclusively owned by one file download
#[derive(Debug)]
pub struct DestinationFile {
    path: PathBuf,
    file: Arc<File>,
}

impl DestinationFile {
    /// Create (or truncate) the destination and optionally pre-size it
    pub async fn create(path: &Path, total_size: u64, preallocate: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_directory(parent).await?;
        }

        let file = fs::File::create(path).await
            .map_err(|e| DownloadError::file_system(path, FileOperation::Create, e))?;

        if preallocate && total_size > 0 {
            file.set_len(total_size).await
                .map_err(|e| DownloadError::file_system(path, FileOperation::Allocate, e))?;
            debug!("Pre-allocated {} bytes for {}", total_size, path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(file.into_std().await),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lend a write capability limited to one part's byte range
    pub fn writer(&self, range: &PartRange) -> PartWriter {
        PartWriter {
            file: Arc::clone(&self.file),
            path: self.path.clone(),
            part: range.index,
            offset: range.offset,
            length: range.length,
        }
    }

    /// Flush file contents to disk
    pub async fn sync(&self) -> Result<()> {
        let file = Arc::clone(&self.file);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(|e| DownloadError::TaskFailed {
                file: path.clone(),
                reason: format!("sync task failed: {}", e),
                source: Some(Box::new(e)),
            })?
            .map_err(|e| DownloadError::file_system(&path, FileOperation::Write, e))
    }
}

/// Write access to exactly one byte range of a destination file
#[derive(Debug, Clone)]
pub struct PartWriter {
    file: Arc<File>,
    path: PathBuf,
    part: u32,
    offset: u64,
    length: u64,
}

impl PartWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Write `data` at this writer's offset; refuses anything that would leave the range
    pub async fn write(self, data: Vec<u8>) -> Result<u64> {
        let actual = data.len() as u64;
        if actual > self.length {
            return Err(DownloadError::SizeMismatch {
                file: self.path,
                part: self.part,
                expected: self.length,
                actual,
                diff: (actual - self.length) as i64,
            });
        }

        let PartWriter { file, path, offset, .. } = self;
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || write_all_at(&file, &data, offset))
            .await
            .map_err(|e| DownloadError::TaskFailed {
                file: task_path,
                reason: format!("write task failed: {}", e),
                source: Some(Box::new(e)),
            })?
            .map_err(|e| DownloadError::file_system(&path, FileOperation::Write, e))?;

        Ok(actual)
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn range(index: u32, offset: u64, length: u64) -> PartRange {
        PartRange { index, offset, length }
    }

    #[test]
    fn manifest_folder_is_relative_to_root() {
        let root = Path::new("/downloads");
        assert_eq!(
            resolve_local_path(root, "/reads/run1", "a.bam"),
            PathBuf::from("/downloads/reads/run1/a.bam")
        );
        assert_eq!(resolve_local_path(root, "/", "a.bam"), PathBuf::from("/downloads/a.bam"));
        assert_eq!(resolve_local_path(root, "../escape", "a.bam"), PathBuf::from("/downloads/escape/a.bam"));
    }

    #[tokio::test]
    async fn ensure_directory_is_idempotent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_directory(&nested).await.unwrap();
        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn out_of_order_writes_land_at_their_offsets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let destination = DestinationFile::create(&path, 9, true).await.unwrap();

        let third = destination.writer(&range(3, 6, 3));
        let first = destination.writer(&range(1, 0, 3));
        let second = destination.writer(&range(2, 3, 3));

        let (a, b, c) = tokio::join!(
            third.write(b"ghi".to_vec()),
            first.write(b"abc".to_vec()),
            second.write(b"def".to_vec()),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (3, 3, 3));
        destination.sync().await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abcdefghi");
    }

    #[tokio::test]
    async fn create_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        tokio::fs::write(&path, b"stale contents that are long").await.unwrap();

        let destination = DestinationFile::create(&path, 4, true).await.unwrap();
        destination.sync().await.unwrap();

        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn writer_refuses_data_beyond_its_range() {
        let dir = tempdir().unwrap();
        let destination = DestinationFile::create(&dir.path().join("out.bin"), 4, true).await.unwrap();
        let writer = destination.writer(&range(1, 0, 2));

        assert!(matches!(
            writer.write(b"toolong".to_vec()).await,
            Err(DownloadError::SizeMismatch { part: 1, expected: 2, actual: 7, .. })
        ));
    }
}
