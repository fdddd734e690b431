//! Error types for the metapool library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for metapool operations.
#[derive(Debug, Error)]
pub enum MetaPoolError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error reading a spreadsheet workbook.
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File format not supported by the importer.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Input contained no data records.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Neither binary nor continuous columns present in the input.
    #[error(
        "Cannot determine outcome type from data. Expected binary (events) or continuous (mean/SD) data."
    )]
    AmbiguousOutcomeType,

    /// Input shape does not match any accepted structure.
    #[error("Malformed structure: {0}")]
    MalformedStructure(String),

    /// Structural or numeric mismatch against the canonical data shapes.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The engine runner could not be started at all.
    #[error("Engine runner '{runner}' could not be started: {source}")]
    EngineNotFound {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine script exited with a nonzero code.
    #[error("Engine script failed with exit code {code}:\n{stderr}")]
    EngineRuntime { code: i32, stderr: String },

    /// The engine script exceeded the configured timeout.
    #[error("Engine script timed out after {0:?}")]
    EngineTimeout(Duration),
}

/// Result type alias for metapool operations.
pub type Result<T> = std::result::Result<T, MetaPoolError>;
