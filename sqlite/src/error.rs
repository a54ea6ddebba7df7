//! Error types for dataset storage operations.
//!
//! Provides a unified error type covering storage access, schema shape
//! changes, row lookups, and transaction state. Errors from the in-memory
//! collection and codec layer are wrapped via `#[from]`.

use metavault_core::CoreError;
use thiserror::Error;

/// Errors that can occur during dataset storage operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Underlying storage engine failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Attempt to create a dataset whose name is already taken.
    #[error("dataset '{0}' already exists")]
    DatasetExists(String),

    /// Requested dataset does not exist.
    #[error("dataset '{0}' does not exist")]
    DatasetNotFound(String),

    /// Requested row key does not exist in the dataset.
    #[error("no entry for key '{key}' in dataset '{dataset}'")]
    KeyNotFound {
        /// Dataset the lookup ran against.
        dataset: String,
        /// Key that was not found.
        key: String,
    },

    /// Attribute name is not declared in the dataset's schema.
    #[error("unknown attribute '{attribute}' in dataset '{dataset}'")]
    UnknownAttribute {
        /// Dataset the operation ran against.
        dataset: String,
        /// Attribute that is not declared.
        attribute: String,
    },

    /// Dataset redeclared with a conflicting attribute set.
    #[error("schema error: {0}")]
    Schema(String),

    /// Random sample larger than the dataset.
    #[error("cannot sample {requested} rows from a dataset of {available}")]
    InsufficientRows {
        /// Number of rows requested.
        requested: usize,
        /// Number of rows available.
        available: usize,
    },

    /// Rollback requested with no active transaction checkpoint.
    #[error("no transaction checkpoint is active")]
    NoCheckpoint,

    /// Dataset or attribute name contains invalid characters.
    #[error("invalid name '{0}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidName(String),

    /// Stored value does not fit the scalar data model.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Failure in the in-memory collection or file codec layer.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience alias for results with [`VaultError`].
pub type Result<T> = std::result::Result<T, VaultError>;
