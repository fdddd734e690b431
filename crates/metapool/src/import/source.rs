//! Import provenance metadata.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Metadata about an imported source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format (csv, tsv, xlsx, json, ...).
    pub format: String,
    /// Number of outcome records imported.
    pub record_count: usize,
    /// When the import was performed.
    pub imported_at: DateTime<Utc>,
}

impl SourceMetadata {
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: String,
        record_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            record_count,
            imported_at: Utc::now(),
        }
    }
}

/// A normalized dataset together with where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedDataset {
    pub dataset: Dataset,
    pub source: SourceMetadata,
}
