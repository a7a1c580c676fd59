//! Error taxonomy for qdiag-core.

use std::path::PathBuf;

use qdiag_store::StoreError;

/// Errors produced while configuring or orchestrating an analysis.
///
/// Data-quality findings are never errors; they are reported as check results.
#[derive(Debug, thiserror::Error)]
pub enum DiagError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("invalid config {}: {source}", path.display())]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid analysis settings: {0}")]
    InvalidSettings(String),

    #[error("unknown check category: {0}")]
    UnknownCategory(String),

    #[error("no logs found in {}", dir.display())]
    NoLogs { dir: PathBuf },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for qdiag-core operations.
pub type Result<T> = std::result::Result<T, DiagError>;
