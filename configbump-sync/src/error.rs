//! Error types for configbump-sync.

use std::path::PathBuf;

use thiserror::Error;

use configbump_core::StoreError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing resources failed; fatal to the current pass.
    #[error("resource store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot key that is not a single safe path component.
    #[error("invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: &'static str },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
