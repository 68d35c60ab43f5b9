use std::io;
use std::path::PathBuf;
use thiserror::Error;
use crate::models::format::{ArchiveFormat, Operation};

/// Error taxonomy for every archive operation
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No handler is registered for the archive's extension
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The format's capability flag for this operation is false
    #[error("{operation} is not supported for {format} archives")]
    UnsupportedOperation {
        format: ArchiveFormat,
        operation: Operation,
    },

    /// The container is corrupt or unreadable
    #[error("Failed to read archive {}: {reason}", path.display())]
    FormatRead { path: PathBuf, reason: String },

    /// One entry of an extraction batch failed; the batch was aborted
    #[error("Failed to extract {entry}: {reason}")]
    Extraction { entry: String, reason: String },

    /// The safe rewrite failed; the original archive is untouched
    #[error("Failed to rewrite archive {}: {reason}", path.display())]
    Rewrite { path: PathBuf, reason: String },

    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A selected name matches no entry of the archive
    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Nothing selected: {0}")]
    NothingSelected(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Credential store error: {0}")]
    Credential(String),
}

impl ArchiveError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Filesystem { path: path.into(), source }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ArchiveError::FormatRead { path: path.into(), reason: reason.to_string() }
    }

    pub(crate) fn extraction(entry: &str, reason: impl ToString) -> Self {
        ArchiveError::Extraction { entry: entry.to_string(), reason: reason.to_string() }
    }

    pub(crate) fn rewrite(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ArchiveError::Rewrite { path: path.into(), reason: reason.to_string() }
    }

    /// True for the "capability flag is false" rejection
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, ArchiveError::UnsupportedOperation { .. })
    }
}
