use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::models::ArchiveError;

/// Key used for a password protecting the whole archive
pub const MASTER_PASSWORD_KEY: &str = "master_password";

/// What a stored password unlocks
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialScope {
    /// Every entry of the archive
    Archive,
    /// A single entry, by name
    Entry(String),
}

impl CredentialScope {
    /// Key under which the secret store files this scope
    pub fn key(&self) -> &str {
        match self {
            CredentialScope::Archive => MASTER_PASSWORD_KEY,
            CredentialScope::Entry(name) => name,
        }
    }
}

/// External secret store the service hands passwords to
///
/// Write-only from the archiver's point of view: passwords are stored after
/// a successful encryption and never read back by the core.
pub trait CredentialStore: Send + Sync {
    fn store(&self, archive_path: &Path, scope: &CredentialScope, secret: &str) -> Result<(), ArchiveError>;
}

/// Process-local store, keyed by (archive path, scope key)
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<(PathBuf, String), String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored secret
    pub fn get(&self, archive_path: &Path, scope: &CredentialScope) -> Option<String> {
        let secrets = self.secrets.lock().ok()?;
        secrets
            .get(&(archive_path.to_path_buf(), scope.key().to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.secrets.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn store(&self, archive_path: &Path, scope: &CredentialScope, secret: &str) -> Result<(), ArchiveError> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|e| ArchiveError::Credential(format!("Credential store lock poisoned: {}", e)))?;

        secrets.insert(
            (archive_path.to_path_buf(), scope.key().to_string()),
            secret.to_string(),
        );
        log::debug!("Stored credential {} for {}", scope.key(), archive_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_keys() {
        assert_eq!(CredentialScope::Archive.key(), "master_password");
        assert_eq!(CredentialScope::Entry("docs/a.txt".to_string()).key(), "docs/a.txt");
    }

    #[test]
    fn test_store_is_keyed_by_archive_and_scope() {
        let store = MemoryCredentialStore::new();
        let a = Path::new("/data/a.zip");
        let b = Path::new("/data/b.zip");

        store.store(a, &CredentialScope::Archive, "pw-a").unwrap();
        store.store(b, &CredentialScope::Archive, "pw-b").unwrap();
        store.store(a, &CredentialScope::Entry("x.txt".to_string()), "pw-x").unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(a, &CredentialScope::Archive).as_deref(), Some("pw-a"));
        assert_eq!(store.get(b, &CredentialScope::Archive).as_deref(), Some("pw-b"));
        assert_eq!(
            store.get(a, &CredentialScope::Entry("x.txt".to_string())).as_deref(),
            Some("pw-x")
        );
        assert_eq!(store.get(b, &CredentialScope::Entry("x.txt".to_string())), None);
    }

    #[test]
    fn test_store_overwrites_previous_secret() {
        let store = MemoryCredentialStore::new();
        let path = Path::new("a.zip");

        store.store(path, &CredentialScope::Archive, "old").unwrap();
        store.store(path, &CredentialScope::Archive, "new").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(path, &CredentialScope::Archive).as_deref(), Some("new"));
    }
}
