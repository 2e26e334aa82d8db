//! In-memory manifest: project → files → parts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::downloader::core::error::{DownloadError, Result};
use crate::downloader::core::files::resolve_local_path;

/// Expected size and checksum of one byte range of a remote file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxPart {
    /// Hex-encoded MD5 of the part's bytes
    pub md5: String,
    /// Declared size in bytes
    pub size: u64,
}

/// One remote file and its parts, keyed by 1-based part index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DxFile {
    pub folder: String,
    pub id: String,
    pub name: String,
    pub parts: BTreeMap<String, DxPart>,
}

/// Byte range assigned to a part within the local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub index: u32,
    pub offset: u64,
    pub length: u64,
}

impl PartRange {
    /// Inclusive last byte; `None` for an empty part
    pub fn end(&self) -> Option<u64> {
        self.length.checked_sub(1).and_then(|last| self.offset.checked_add(last))
    }

    /// `Range` header value for this part
    pub fn http_range(&self) -> Option<String> {
        self.end().map(|end| format!("bytes={}-{}", self.offset, end))
    }
}

impl DxFile {
    /// Parts sorted by numeric index; errors on any non-numeric or zero key
    pub fn indexed_parts(&self) -> Result<Vec<(u32, &DxPart)>> {
        let mut indexed = Vec::with_capacity(self.parts.len());
        for (key, part) in &self.parts {
            let index = parse_part_index(key).ok_or_else(|| {
                DownloadError::malformed(format!(
                    "file {} ('{}'): part index '{}' is not a positive integer",
                    self.id, self.name, key
                ))
            })?;
            indexed.push((index, part));
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed)
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DownloadError::malformed(format!("file '{}' has an empty id", self.name)));
        }
        if self.name.trim().is_empty() {
            return Err(DownloadError::malformed(format!("file {} has an empty name", self.id)));
        }
        if self.parts.is_empty() {
            return Err(DownloadError::malformed(format!(
                "file {} ('{}') has no parts", self.id, self.name
            )));
        }

        for (expected, (index, part)) in (1u32..).zip(self.indexed_parts()?) {
            if index != expected {
                return Err(DownloadError::malformed(format!(
                    "file {} ('{}'): part indices must be contiguous from 1, expected {} but found {}",
                    self.id, self.name, expected, index
                )));
            }
            if part.md5.len() != 32 || !part.md5.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DownloadError::malformed(format!(
                    "file {} ('{}'): part {} has invalid md5 '{}'",
                    self.id, self.name, index, part.md5
                )));
            }
        }

        self.part_ranges()?;
        Ok(())
    }

    /// Byte ranges for every part
    ///
    /// Offsets are prefix sums of the preceding parts' declared sizes and each
    /// length is the part's own size. With uniform parts (and a possibly
    /// shorter last part) this is `(i - 1) * size(part 1)`.
    pub fn part_ranges(&self) -> Result<Vec<PartRange>> {
        let mut offset = 0u64;
        let mut ranges = Vec::with_capacity(self.parts.len());
        for (index, part) in self.indexed_parts()? {
            ranges.push(PartRange { index, offset, length: part.size });
            offset = offset.checked_add(part.size).ok_or_else(|| {
                DownloadError::malformed(format!(
                    "file {} ('{}'): part sizes overflow at part {}",
                    self.id, self.name, index
                ))
            })?;
        }
        Ok(ranges)
    }

    /// Part metadata by numeric index
    pub fn part(&self, index: u32) -> Option<&DxPart> {
        self.parts.get(&index.to_string())
    }

    /// Sum of declared part sizes, saturating for files `validate` rejects
    pub fn total_size(&self) -> u64 {
        self.parts.values().fold(0u64, |total, part| total.saturating_add(part.size))
    }

    /// Destination of this file under a local output root
    pub fn local_path(&self, root: &Path) -> PathBuf {
        resolve_local_path(root, &self.folder, &self.name)
    }
}

fn parse_part_index(key: &str) -> Option<u32> {
    key.trim().parse::<u32>().ok().filter(|index| *index > 0)
}

/// Project ID → files to download from that project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub projects: BTreeMap<String, Vec<DxFile>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<S: Into<String>>(mut self, project: S, file: DxFile) -> Self {
        self.projects.entry(project.into()).or_default().push(file);
        self
    }

    /// Validate every file; the first malformed entry fails the whole manifest
    pub fn validate(&self) -> Result<()> {
        for (project, files) in &self.projects {
            if project.trim().is_empty() {
                return Err(DownloadError::malformed("manifest contains an empty project id"));
            }
            for file in files {
                file.validate().map_err(|e| match e {
                    DownloadError::MalformedManifest { reason } => {
                        DownloadError::malformed(format!("project {}: {}", project, reason))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }

    /// Every (project, file) pair in traversal order
    pub fn iter_files(&self) -> impl Iterator<Item = (&str, &DxFile)> {
        self.projects
            .iter()
            .flat_map(|(project, files)| files.iter().map(move |file| (project.as_str(), file)))
    }

    pub fn file_count(&self) -> usize {
        self.projects.values().map(Vec::len).sum()
    }

    pub fn part_count(&self) -> usize {
        self.iter_files().map(|(_, file)| file.parts.len()).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.iter_files().fold(0u64, |total, (_, file)| total.saturating_add(file.total_size()))
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }
}
