//! Archive viewer backend
//!
//! Lists, extracts and edits 7z, zip, rar, tar, gzip and bzip2 archives
//! behind one [`ArchiveHandler`] interface. The presentation layer talks to
//! [`ArchiveService`], which resolves the handler from the file extension,
//! checks capabilities and relays results.

// Module declarations
pub mod models;
pub mod core;
pub mod commands;
pub mod utils;

pub use crate::commands::{ArchiveService, CredentialScope, CredentialStore, MemoryCredentialStore};
pub use crate::core::compression::common::ArchiveHandler;
pub use crate::core::compression::FormatRegistry;
pub use crate::models::{
    ArchiveEntry, ArchiveError, ArchiveFormat, ArchiverConfig, Capabilities, Operation, UnsupportedPolicy,
    ZipCompression,
};
pub use crate::utils::{ExtractionJob, NoProgress, ProgressEvent, ProgressSink};
