use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use crate::models::ArchiveError;

/// A file queued for insertion into an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File on disk
    pub path: PathBuf,
    /// Entry name it will get inside the archive
    pub entry_name: String,
}

/// Expand the paths handed to `add` into concrete files
///
/// # Behavior
/// - A plain file becomes one entry named by its base file name
/// - A directory contributes every file below it, named
///   `<dir name>/<relative path>` and sorted by that name
/// - Input order is preserved between arguments
/// - Missing paths fail with `ArchiveError::Filesystem`
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>, ArchiveError> {
    let mut sources = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|e| ArchiveError::fs(path, e))?;
        let base_name = base_name(path)?;

        if metadata.is_dir() {
            let mut nested = scan_directory(path, &base_name)?;
            nested.sort_by(|a, b| a.entry_name.cmp(&b.entry_name));
            sources.extend(nested);
        } else {
            sources.push(SourceFile {
                path: path.clone(),
                entry_name: base_name,
            });
        }
    }

    Ok(sources)
}

fn base_name(path: &Path) -> Result<String, ArchiveError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ArchiveError::fs(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Path has no file name"),
        ))
}

fn scan_directory(root_path: &Path, base_name: &str) -> Result<Vec<SourceFile>, ArchiveError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root_path).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root_path).to_path_buf();
            ArchiveError::fs(path, std::io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root_path)
            .map_err(|e| ArchiveError::fs(
                entry.path(),
                std::io::Error::new(std::io::ErrorKind::Other, format!("Failed to calculate relative path: {}", e)),
            ))?;

        let mut entry_name = base_name.to_string();
        for component in relative.components() {
            entry_name.push('/');
            entry_name.push_str(&component.as_os_str().to_string_lossy());
        }

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            entry_name,
        });
    }

    Ok(files)
}
