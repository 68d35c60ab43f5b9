use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use crate::core::compression::common::{extract_in_order, ArchiveHandler};
use crate::core::file_ops::paths::{extraction_target, same_entry, write_entry};
use crate::models::{ArchiveEntry, ArchiveError, ArchiveFormat};
use crate::utils::progress::ProgressSink;

/// Handler for single-stream compressors (gzip, bzip2)
///
/// Such a file holds exactly one entry, named after the archive with its
/// last extension removed (`notes.txt.gz` holds `notes.txt`). Its size is
/// unknown without decompressing everything, so it is reported as `None`.
/// Mutating operations are ignored.
pub struct StreamHandler {
    format: ArchiveFormat,
}

impl StreamHandler {
    pub fn gzip() -> Self {
        Self {
            format: ArchiveFormat::Gzip,
        }
    }

    pub fn bzip2() -> Self {
        Self {
            format: ArchiveFormat::Bzip2,
        }
    }

    fn decoder(&self, archive_path: &Path) -> Result<Box<dyn Read>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open {} file: {}", self.format, e)))?;
        let reader = BufReader::new(file);

        Ok(match self.format {
            ArchiveFormat::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            _ => Box::new(MultiGzDecoder::new(reader)),
        })
    }

    /// Decode the stream header to make sure the file really is
    /// `self.format` data
    fn probe(&self, archive_path: &Path) -> Result<(), ArchiveError> {
        let mut decoder = self.decoder(archive_path)?;
        let mut probe = [0u8; 1];
        decoder
            .read(&mut probe)
            .map_err(|e| ArchiveError::read(archive_path, format!("Invalid {} stream: {}", self.format, e)))?;
        Ok(())
    }

    /// Name of the single decompressed entry
    fn entry_name(archive_path: &Path) -> String {
        archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl ArchiveHandler for StreamHandler {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        self.probe(archive_path)?;
        Ok(vec![ArchiveEntry::file(Self::entry_name(archive_path), None)])
    }

    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        let single = Self::entry_name(archive_path);
        self.probe(archive_path)?;

        extract_in_order(names, dest_dir, progress, |name| {
            if !same_entry(name, &single) {
                return Err(ArchiveError::extraction(name, "Entry not found in archive"));
            }
            let output_path = extraction_target(dest_dir, name)?;
            let mut decoder = self.decoder(archive_path)?;
            write_entry(&mut decoder, name, &output_path)?;
            Ok(())
        })
    }
}
