//! Download manifests
//!
//! A manifest maps project IDs to the files to fetch from each project. Every
//! file lists its parts by 1-based index with an expected MD5 and size; the
//! engine turns those into disjoint byte ranges of the local file.

pub mod model;
pub mod parser;

// Re-export main types
pub use model::{DxFile, DxPart, Manifest, PartRange};
pub use parser::{read_manifest, ManifestEncoding};
