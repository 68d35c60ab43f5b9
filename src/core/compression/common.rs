use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use crate::models::{
    ArchiveEntry, ArchiveError, ArchiveFormat, Capabilities, Operation, UnsupportedPolicy,
};
use crate::utils::progress::{ProgressSink, ProgressTracker};

/// Common interface for archive handlers
///
/// One implementation per format. Every handler answers every operation:
/// operations its format cannot perform fall through to the default
/// implementations, which apply the format's `UnsupportedPolicy`.
pub trait ArchiveHandler: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Capability flags of this handler's format
    fn capabilities(&self) -> Capabilities {
        self.format().capabilities()
    }

    /// Check if this handler supports the given archive
    ///
    /// # Arguments
    /// * `archive_path` - Path to check (extension compared case-insensitively)
    fn supports(&self, archive_path: &Path) -> bool {
        ArchiveFormat::from_path(archive_path) == Some(self.format())
    }

    /// List the archive's entries in container order
    ///
    /// # Returns
    /// * `Err(ArchiveError::FormatRead)` if the container is corrupt or unreadable
    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Extract the named entries below `dest_dir`
    ///
    /// # Arguments
    /// * `archive_path` - Archive to read
    /// * `names` - Entry names to extract, in the order progress is reported
    /// * `dest_dir` - Destination root; relative entry paths are preserved
    /// * `progress` - Receives one event per entry plus the final sentinel
    ///
    /// # Behavior
    /// - Aborts on the first failing entry
    /// - An empty `names` fails with `ArchiveError::NothingSelected`
    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError>;

    /// Remove the named entries, keeping everything else byte-identical
    fn delete(&self, _archive_path: &Path, _names: &[String]) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Delete)
    }

    fn rename(&self, _archive_path: &Path, _old_name: &str, _new_name: &str) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Rename)
    }

    /// Re-write every entry under `password`
    fn encrypt_archive(&self, _archive_path: &Path, _password: &str) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Encrypt)
    }

    /// Re-write only the named entries, each under its own password
    fn encrypt_entries(
        &self,
        _archive_path: &Path,
        _passwords: &HashMap<String, String>,
    ) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Encrypt)
    }

    /// Create a new, empty, valid archive at `archive_path`
    fn create(&self, _archive_path: &Path) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Create)
    }

    /// Append `sources` to the archive
    ///
    /// Files are named by their base file name, directories contribute every
    /// file below them.
    fn add(&self, _archive_path: &Path, _sources: &[PathBuf]) -> Result<(), ArchiveError> {
        self.unsupported(Operation::Add)
    }

    /// Outcome of an operation this format cannot perform
    fn unsupported(&self, operation: Operation) -> Result<(), ArchiveError> {
        let format = self.format();
        match format.unsupported_policy() {
            UnsupportedPolicy::Reject => Err(ArchiveError::UnsupportedOperation { format, operation }),
            UnsupportedPolicy::Ignore => {
                log::debug!("{} ignored for {} archive", operation, format);
                Ok(())
            }
        }
    }
}

/// Drive a per-entry extraction batch
///
/// Calls `extract_one` for each name in input order, reporting one progress
/// event after each entry and the sentinel after the last one. The first
/// failure aborts the batch; no sentinel is emitted in that case.
pub(crate) fn extract_in_order<F>(
    names: &[String],
    dest_dir: &Path,
    progress: &mut dyn ProgressSink,
    mut extract_one: F,
) -> Result<(), ArchiveError>
where
    F: FnMut(&str) -> Result<(), ArchiveError>,
{
    if names.is_empty() {
        return Err(ArchiveError::NothingSelected("No entries selected for extraction".to_string()));
    }

    fs::create_dir_all(dest_dir).map_err(|e| ArchiveError::fs(dest_dir, e))?;

    let mut tracker = ProgressTracker::new(progress, names.len());
    for name in names {
        log::debug!("Extracting {}", name);
        if let Err(e) = extract_one(name) {
            log::warn!("Extraction aborted at {}: {}", name, e);
            return Err(match e {
                err @ (ArchiveError::Extraction { .. } | ArchiveError::Filesystem { .. }) => err,
                other => ArchiveError::extraction(name, other),
            });
        }
        tracker.advance(name);
    }
    tracker.finish();

    Ok(())
}
