pub mod error;
pub mod entry;
pub mod format;
pub mod config;

// Re-export commonly used types
pub use error::ArchiveError;
pub use entry::ArchiveEntry;
pub use format::{ArchiveFormat, Capabilities, Operation, UnsupportedPolicy};
pub use config::{ArchiverConfig, ZipCompression};
