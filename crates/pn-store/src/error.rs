//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted schema is inconsistent; the file is not repaired.
    #[error("Corrupt store: {what}")]
    Corrupt { what: String },

    #[error("Invalid key '{key}': {what}")]
    InvalidKey { key: String, what: &'static str },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown group: {group}")]
    UnknownGroup { group: String },

    #[error("Unknown element '{element}' in group '{group}'")]
    UnknownElement { group: String, element: String },

    #[error("Row {row} out of range (len={len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("Shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Store not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Store opened read-only: {}", path.display())]
    ReadOnly { path: PathBuf },
}

impl StoreError {
    pub(crate) fn corrupt(what: impl Into<String>) -> Self {
        StoreError::Corrupt { what: what.into() }
    }

    pub(crate) fn overflow(name: &str) -> Self {
        Self::corrupt(format!("dataset '{name}' extent arithmetic overflows"))
    }
}
