//! Error types for qdiag-store

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or converting a log document.
///
/// Only `NotFound` and `Malformed` are fatal to a caller. `CorruptField` is
/// scoped to one field and surfaces only through [`crate::LogStore::try_field`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested log file does not exist
    #[error("Log file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but is not a flat JSON object of sequences
    #[error("Malformed log document {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// A present field holds a non-numeric element
    #[error("Field '{field}' has a non-numeric element at index {index}: {found}")]
    CorruptField {
        field: String,
        index: usize,
        found: String,
    },

    /// Reading the file failed for a reason other than absence
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Build a `Malformed` error for an in-memory document with no path.
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is scoped to a single field rather than the document.
    pub fn is_field_level(&self) -> bool {
        matches!(self, StoreError::CorruptField { .. })
    }
}
