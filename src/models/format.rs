use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};

/// Supported container formats
///
/// Closed set: the registry maps an extension to one of these variants and
/// each variant has exactly one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    SevenZip,
    Zip,
    Rar,
    Tar,
    Gzip,
    Bzip2,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 6] = [
        ArchiveFormat::SevenZip,
        ArchiveFormat::Zip,
        ArchiveFormat::Rar,
        ArchiveFormat::Tar,
        ArchiveFormat::Gzip,
        ArchiveFormat::Bzip2,
    ];

    /// Extension (lowercase, without dot) the format is registered under
    pub fn extension(&self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::Tar => "tar",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Match an extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    /// Resolve the format from the last extension of a path
    ///
    /// `backup.tar.gz` resolves to `Gzip`: only the final extension counts.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Capability flags, fixed per format
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Self::SevenZip => Capabilities {
                deletion: true,
                renaming: true,
                encryption: false,
                creation: true,
            },
            Self::Zip => Capabilities {
                deletion: true,
                renaming: true,
                encryption: true,
                creation: true,
            },
            Self::Rar | Self::Tar | Self::Gzip | Self::Bzip2 => Capabilities::READ_ONLY,
        }
    }

    /// What a handler does when asked for an operation its flags deny
    pub const fn unsupported_policy(&self) -> UnsupportedPolicy {
        match self {
            Self::Rar => UnsupportedPolicy::Reject,
            _ => UnsupportedPolicy::Ignore,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Mutating operations gated by a capability flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Delete,
    Rename,
    Encrypt,
    Create,
    Add,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Delete => "Deletion",
            Self::Rename => "Renaming",
            Self::Encrypt => "Encryption",
            Self::Create => "Creation",
            Self::Add => "Adding files",
        };
        f.write_str(label)
    }
}

/// The four per-format capability flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub deletion: bool,
    pub renaming: bool,
    pub encryption: bool,
    /// Covers both creating a new archive and adding files to one
    pub creation: bool,
}

impl Capabilities {
    pub const READ_ONLY: Capabilities = Capabilities {
        deletion: false,
        renaming: false,
        encryption: false,
        creation: false,
    };

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Delete => self.deletion,
            Operation::Rename => self.renaming,
            Operation::Encrypt => self.encryption,
            Operation::Create | Operation::Add => self.creation,
        }
    }
}

/// Handler behavior for an operation whose capability flag is false
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    /// Fail with `ArchiveError::UnsupportedOperation`
    Reject,
    /// Return `Ok(())` without touching the archive
    Ignore,
}
