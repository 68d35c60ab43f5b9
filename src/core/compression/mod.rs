// Archive format handlers
pub mod common;
pub mod zip_handler;
pub mod rar_handler;
pub mod tar_handler;
pub mod stream_handler;

#[path = "7z_handler.rs"]
pub mod sevenz_handler;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use crate::models::{ArchiveError, ArchiveFormat, ArchiverConfig};
use common::ArchiveHandler;
use rar_handler::RarHandler;
use sevenz_handler::SevenZHandler;
use stream_handler::StreamHandler;
use tar_handler::TarHandler;
use zip_handler::ZipHandler;

/// Extension-to-handler dispatch table
///
/// Built once at startup from the process configuration and passed to
/// whoever needs it. Read-only after construction, so it can be shared
/// across threads behind an `Arc`.
pub struct FormatRegistry {
    handlers: HashMap<ArchiveFormat, Arc<dyn ArchiveHandler>>,
}

impl FormatRegistry {
    /// Create a registry with a handler for every supported format
    pub fn new(config: &ArchiverConfig) -> Self {
        let handlers: Vec<Arc<dyn ArchiveHandler>> = vec![
            Arc::new(SevenZHandler::with_config(config)),
            Arc::new(ZipHandler::with_config(config)),
            Arc::new(RarHandler::new()),
            Arc::new(TarHandler::new()),
            Arc::new(StreamHandler::gzip()),
            Arc::new(StreamHandler::bzip2()),
        ];

        Self {
            handlers: handlers.into_iter().map(|h| (h.format(), h)).collect(),
        }
    }

    /// Resolve the handler for an archive from its extension
    ///
    /// # Arguments
    /// * `archive_path` - Path to the archive file
    ///
    /// # Returns
    /// * Handler for this archive's format
    /// * `Err(ArchiveError::UnsupportedFormat)` when no handler matches
    pub fn handler_for(&self, archive_path: &Path) -> Result<Arc<dyn ArchiveHandler>, ArchiveError> {
        ArchiveFormat::from_path(archive_path)
            .and_then(|format| self.handlers.get(&format))
            .map(Arc::clone)
            .ok_or_else(|| {
                let ext = archive_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown");
                ArchiveError::UnsupportedFormat(format!(".{}", ext))
            })
    }

    /// Check if a file is a supported archive format
    pub fn is_supported(&self, path: &Path) -> bool {
        self.handler_for(path).is_ok()
    }

    /// Get list of supported archive extensions
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        ArchiveFormat::ALL
            .iter()
            .filter(|format| self.handlers.contains_key(format))
            .map(|format| format.extension())
            .collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new(&ArchiverConfig::default())
    }
}
