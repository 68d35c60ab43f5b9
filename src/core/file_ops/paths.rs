use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use crate::models::ArchiveError;

/// Join an archive entry name onto a destination directory
///
/// Returns `None` when the name would escape `dest_root` (absolute paths,
/// `..` components, drive prefixes).
pub fn safe_join(dest_root: &Path, entry_name: &str) -> Option<PathBuf> {
    let normalized = entry_name.replace('\\', "/");
    let mut clean = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(dest_root.join(clean))
}

/// Normalize a name reported by a codec to the `/`-separated form
pub fn normalize_entry_name(raw: &str) -> String {
    raw.replace('\\', "/")
}

/// Compare two entry names ignoring a trailing directory slash
pub fn same_entry(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Stream one entry's bytes into a new file at `output_path`
///
/// # Behavior
/// - Creates parent directories as needed
/// - Destination problems (permissions, bad paths) fail with
///   `ArchiveError::Filesystem`
/// - Read errors from the decoder fail with `ArchiveError::Extraction`
pub fn write_entry<R: Read + ?Sized>(
    reader: &mut R,
    entry_name: &str,
    output_path: &Path,
) -> Result<u64, ArchiveError> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ArchiveError::fs(parent, e))?;
    }
    let mut output_file = File::create(output_path).map_err(|e| ArchiveError::fs(output_path, e))?;

    let mut written = 0u64;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::extraction(entry_name, e)),
        };
        output_file
            .write_all(&buf[..n])
            .map_err(|e| ArchiveError::fs(output_path, e))?;
        written += n as u64;
    }

    Ok(written)
}

/// Create the directory an entry stands for
pub fn create_entry_dir(output_path: &Path) -> Result<(), ArchiveError> {
    fs::create_dir_all(output_path).map_err(|e| ArchiveError::fs(output_path, e))
}

/// Resolve the on-disk target of `entry_name`, rejecting unsafe names
pub(crate) fn extraction_target(dest_dir: &Path, entry_name: &str) -> Result<PathBuf, ArchiveError> {
    safe_join(dest_dir, entry_name).ok_or_else(|| {
        ArchiveError::extraction(entry_name, "Entry path escapes the destination directory")
    })
}
