//! Error types for in-memory collections and file codecs.
//!
//! Covers format detection, sampling, and import/export failures. Storage
//! errors live in the sqlite crate, which wraps this type with `#[from]`.

use thiserror::Error;

/// Errors from in-memory subset operations and file import/export.
#[derive(Debug, Error)]
pub enum CoreError {
    /// File extension is not one of the supported formats.
    #[error("unsupported format '{0}': expected one of 'csv', 'json', 'jsonl'")]
    UnsupportedFormat(String),

    /// Random sample larger than the population.
    #[error("cannot sample {requested} entries from a collection of {available}")]
    InsufficientRows {
        /// Number of entries requested.
        requested: usize,
        /// Number of entries available.
        available: usize,
    },

    /// Imported data does not fit the key/attribute-map model.
    #[error("import error: {0}")]
    Import(String),

    /// Underlying I/O failure while reading or writing a file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse or serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parse or serialization failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias for results with [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
