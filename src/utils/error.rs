//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//! Per-record data problems are not errors: they are logged and skipped.

use thiserror::Error;

/// Errors that can occur while reading a dump directory
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON deserialization failed in {path}: {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid dump directory: {0}")]
    InvalidDump(String),
}

/// Errors raised at a specific lookup site during entity building
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Capture location not present in silicon data: {0}")]
    MissingLocation(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
