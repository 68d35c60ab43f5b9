use serde::{Deserialize, Serialize};

/// One logical item inside an archive
///
/// Entries are rebuilt on every listing and never mutated in place; the
/// name is the key within its archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    /// Relative path inside the archive, `/`-separated
    pub name: String,
    /// Uncompressed size; `None` when the container does not record it
    pub size: Option<u64>,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
            is_dir: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: Some(0),
            is_dir: true,
        }
    }

    /// Parent path of the entry, empty for root-level entries
    ///
    /// # Example
    /// ```ignore
    /// "docs/api/index.html" -> "docs/api"
    /// "docs/api/"           -> "docs"
    /// "readme.txt"          -> ""
    /// ```
    pub fn subdirectory(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[..idx],
            None => "",
        }
    }

    /// Last path component of the name
    pub fn file_name(&self) -> &str {
        let trimmed = self.name.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdirectory() {
        assert_eq!(ArchiveEntry::file("docs/api/index.html", Some(3)).subdirectory(), "docs/api");
        assert_eq!(ArchiveEntry::file("readme.txt", None).subdirectory(), "");
        assert_eq!(ArchiveEntry::directory("docs/api/").subdirectory(), "docs");
        assert_eq!(ArchiveEntry::directory("docs/").subdirectory(), "");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(ArchiveEntry::file("docs/api/index.html", Some(3)).file_name(), "index.html");
        assert_eq!(ArchiveEntry::directory("docs/api/").file_name(), "api");
        assert_eq!(ArchiveEntry::file("readme.txt", None).file_name(), "readme.txt");
    }

    #[test]
    fn test_unknown_size_is_not_zero() {
        let unknown = ArchiveEntry::file("data", None);
        let empty = ArchiveEntry::file("data", Some(0));
        assert_ne!(unknown, empty);
    }
}
