use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use crate::models::ArchiveError;

/// Temporary sibling of an archive being rewritten
///
/// Protocol:
/// 1. `begin` checks the original exists and creates a uniquely named temp
///    file next to it (`.<name>.<random><suffix>`, created exclusively)
/// 2. The caller streams the transformed archive into `file()`
/// 3. `commit` flushes, syncs and atomically renames the temp file over
///    the original
///
/// Dropping a `SafeRewrite` without committing removes the temp file and
/// leaves the original untouched.
pub struct SafeRewrite {
    target: PathBuf,
    temp: NamedTempFile,
}

impl SafeRewrite {
    /// Start a rewrite of `target`
    ///
    /// # Arguments
    /// * `target` - Existing archive to replace on commit
    /// * `suffix` - Suffix of the temp file name (e.g. ".temp")
    pub fn begin(target: &Path, suffix: &str) -> Result<Self, ArchiveError> {
        let metadata = fs::metadata(target)
            .map_err(|e| ArchiveError::rewrite(target, format!("Cannot access original archive: {}", e)))?;
        if !metadata.is_file() {
            return Err(ArchiveError::rewrite(target, "Original archive is not a regular file"));
        }

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(suffix)
            .rand_bytes(8)
            .tempfile_in(&dir)
            .map_err(|e| ArchiveError::rewrite(
                target,
                format!("Failed to create temporary file in {}: {}", dir.display(), e)
            ))?;

        // Keep the original's permissions instead of the temp file's 0600
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| ArchiveError::rewrite(target, format!("Failed to copy permissions: {}", e)))?;

        log::debug!("Rewriting {} via {}", target.display(), temp.path().display());

        Ok(Self {
            target: target.to_path_buf(),
            temp,
        })
    }

    /// Writable handle to the temp file
    pub fn file(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Replace the original with the fully written temp file
    pub fn commit(mut self) -> Result<(), ArchiveError> {
        let target = self.target;

        self.temp
            .as_file_mut()
            .flush()
            .and_then(|_| self.temp.as_file().sync_all())
            .map_err(|e| ArchiveError::rewrite(&target, format!("Failed to flush temporary file: {}", e)))?;

        // Both sides must still be in place right before the swap
        if !self.temp.path().is_file() {
            return Err(ArchiveError::rewrite(&target, "Temporary file disappeared before commit"));
        }
        if !target.is_file() {
            return Err(ArchiveError::rewrite(&target, "Original archive disappeared during rewrite"));
        }

        self.temp
            .persist(&target)
            .map_err(|e| ArchiveError::rewrite(&target, format!("Failed to replace original: {}", e.error)))?;

        log::info!("Rewrote archive {}", target.display());
        Ok(())
    }
}

/// Run a complete rewrite of `target`
///
/// `write` receives the temp file and must leave a complete archive in it.
/// Any error (including failing to open the original) is reported as
/// `ArchiveError::Rewrite` and the original is left byte-identical.
pub fn rewrite_archive<F>(target: &Path, suffix: &str, write: F) -> Result<(), ArchiveError>
where
    F: FnOnce(&mut File) -> Result<(), ArchiveError>,
{
    let mut rewrite = SafeRewrite::begin(target, suffix)?;

    if let Err(e) = write(rewrite.file()) {
        let temp_path = rewrite.temp_path().to_path_buf();
        drop(rewrite);
        if temp_path.exists() {
            log::warn!("Temporary file {} was not cleaned up", temp_path.display());
        }
        return Err(match e {
            err @ ArchiveError::Rewrite { .. } => err,
            other => ArchiveError::rewrite(target, other),
        });
    }

    rewrite.commit()
}

/// Create a brand new archive file at `target`
///
/// The file is opened with `create_new`, so an existing path fails with an
/// `AlreadyExists` filesystem error instead of being overwritten. If `write`
/// fails, the half-written file is removed.
pub fn create_archive<F>(target: &Path, write: F) -> Result<(), ArchiveError>
where
    F: FnOnce(File) -> Result<(), ArchiveError>,
{
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|e| ArchiveError::fs(target, e))?;

    if let Err(e) = write(file) {
        if let Err(cleanup) = fs::remove_file(target) {
            log::warn!("Failed to remove incomplete archive {}: {}", target.display(), cleanup);
        }
        return Err(e);
    }

    log::info!("Created archive {}", target.display());
    Ok(())
}

/// Name prefix shared by every temp file of `target`, used to spot leftovers
pub fn temp_prefix(target: &Path) -> OsString {
    let mut prefix = OsString::from(".");
    if let Some(name) = target.file_name() {
        prefix.push(name);
    }
    prefix.push(".");
    prefix
}
