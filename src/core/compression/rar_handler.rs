use std::path::Path;
use unrar::Archive;
use crate::core::compression::common::{extract_in_order, ArchiveHandler};
use crate::core::file_ops::paths::{create_entry_dir, extraction_target, normalize_entry_name, same_entry, write_entry};
use crate::models::{ArchiveEntry, ArchiveError, ArchiveFormat};
use crate::utils::progress::ProgressSink;

/// RAR archive handler
///
/// Read and extract only. The RAR container cannot be written without the
/// proprietary encoder, so every mutating operation is rejected with
/// `ArchiveError::UnsupportedOperation`.
pub struct RarHandler;

impl RarHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveHandler for RarHandler {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let archive = Archive::new(archive_path)
            .open_for_listing()
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open RAR archive: {}", e)))?;

        let mut entries = Vec::new();
        for header in archive {
            let header = header
                .map_err(|e| ArchiveError::read(archive_path, format!("Failed to read RAR header: {}", e)))?;
            let name = normalize_entry_name(&header.filename.to_string_lossy());

            entries.push(if header.is_directory() {
                ArchiveEntry::directory(name)
            } else {
                ArchiveEntry::file(name, Some(header.unpacked_size))
            });
        }

        Ok(entries)
    }

    /// Extract the named entries
    ///
    /// # Behavior
    /// - Each name is located by walking the headers from the start
    /// - Entries before the match are skipped without decompressing
    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        // Surface a corrupt container as FormatRead before the batch starts
        Archive::new(archive_path)
            .open_for_listing()
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open RAR archive: {}", e)))?;

        extract_in_order(names, dest_dir, progress, |name| {
            let output_path = extraction_target(dest_dir, name)?;
            let mut cursor = Archive::new(archive_path)
                .open_for_processing()
                .map_err(|e| ArchiveError::extraction(name, format!("Failed to open RAR archive: {}", e)))?;

            loop {
                let header = match cursor.read_header().map_err(|e| ArchiveError::extraction(name, e))? {
                    Some(header) => header,
                    None => return Err(ArchiveError::extraction(name, "Entry not found in archive")),
                };

                let entry_name = normalize_entry_name(&header.entry().filename.to_string_lossy());
                if !same_entry(&entry_name, name) {
                    cursor = header.skip().map_err(|e| ArchiveError::extraction(name, e))?;
                    continue;
                }

                if header.entry().is_directory() {
                    return create_entry_dir(&output_path);
                }

                let (data, _) = header.read().map_err(|e| ArchiveError::extraction(name, e))?;
                write_entry(&mut data.as_slice(), name, &output_path)?;
                return Ok(());
            }
        })
    }
}

impl Default for RarHandler {
    fn default() -> Self {
        Self::new()
    }
}
