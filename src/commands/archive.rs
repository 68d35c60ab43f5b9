use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::commands::credentials::{CredentialScope, CredentialStore};
use crate::core::compression::{common::ArchiveHandler, FormatRegistry};
use crate::models::{ArchiveEntry, ArchiveError, ArchiverConfig, Capabilities, Operation};
use crate::utils::background::ExtractionJob;
use crate::utils::progress::ProgressSink;

/// Entry point used by the presentation layer
///
/// Sequencing rules for every call:
/// 1. Resolve the handler from the archive's extension (fresh each call)
/// 2. For mutating calls, reject on a false capability flag before any I/O
/// 3. Delegate to the handler and relay its result unchanged
///
/// Mutations of the same archive must not run concurrently; the caller is
/// responsible for serializing them per path.
pub struct ArchiveService {
    registry: Arc<FormatRegistry>,
    credentials: Arc<dyn CredentialStore>,
    config: ArchiverConfig,
}

impl ArchiveService {
    /// Create a service with a registry built from `config`
    pub fn new(config: ArchiverConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, ArchiveError> {
        config.validate()?;
        let registry = Arc::new(FormatRegistry::new(&config));

        log::info!(
            "Archive service ready, formats: {}",
            registry.supported_extensions().join(", ")
        );

        Ok(Self {
            registry,
            credentials,
            config,
        })
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Capability flags for the archive's format
    pub fn capabilities(&self, archive_path: &Path) -> Result<Capabilities, ArchiveError> {
        Ok(self.registry.handler_for(archive_path)?.capabilities())
    }

    /// Resolve the handler and check `operation` is allowed for its format
    fn checked_handler(
        &self,
        archive_path: &Path,
        operation: Operation,
    ) -> Result<Arc<dyn ArchiveHandler>, ArchiveError> {
        let handler = self.registry.handler_for(archive_path)?;

        if !handler.capabilities().supports(operation) {
            let format = handler.format();
            log::warn!("{} rejected for {}: not supported by {} archives", operation, archive_path.display(), format);
            return Err(ArchiveError::UnsupportedOperation { format, operation });
        }

        Ok(handler)
    }

    pub fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        self.registry.handler_for(archive_path)?.list(archive_path)
    }

    /// Names to extract; an empty selection means every entry
    fn selection(
        &self,
        handler: &dyn ArchiveHandler,
        archive_path: &Path,
        names: Vec<String>,
    ) -> Result<Vec<String>, ArchiveError> {
        if !names.is_empty() {
            return Ok(names);
        }

        let all: Vec<String> = handler.list(archive_path)?.into_iter().map(|e| e.name).collect();
        if all.is_empty() {
            return Err(ArchiveError::NothingSelected(format!(
                "{} has no entries to extract",
                archive_path.display()
            )));
        }
        log::debug!("No selection, extracting all {} entries", all.len());
        Ok(all)
    }

    /// Extract entries on the calling thread
    ///
    /// # Arguments
    /// * `names` - Entries to extract in progress order; empty extracts everything
    /// * `progress` - Receives one event per entry plus the final sentinel
    pub fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        let handler = self.registry.handler_for(archive_path)?;
        let names = self.selection(handler.as_ref(), archive_path, names.to_vec())?;

        handler.extract(archive_path, &names, dest_dir, progress)?;
        log::info!("Extracted {} entries from {}", names.len(), archive_path.display());
        Ok(())
    }

    /// Extract entries on a background worker
    ///
    /// The handler and the selection are resolved before the worker starts,
    /// so format errors surface here rather than through the job.
    pub fn spawn_extract(
        &self,
        archive_path: &Path,
        names: Vec<String>,
        dest_dir: &Path,
    ) -> Result<ExtractionJob, ArchiveError> {
        let handler = self.registry.handler_for(archive_path)?;
        let names = self.selection(handler.as_ref(), archive_path, names)?;

        ExtractionJob::spawn(
            handler,
            archive_path.to_path_buf(),
            names,
            dest_dir.to_path_buf(),
            self.config.progress_capacity,
        )
    }

    pub fn delete(&self, archive_path: &Path, names: &[String]) -> Result<(), ArchiveError> {
        if names.is_empty() {
            return Err(ArchiveError::NothingSelected("No entries selected for deletion".to_string()));
        }
        let handler = self.checked_handler(archive_path, Operation::Delete)?;

        handler.delete(archive_path, names)?;
        log::info!("Deleted {} entries from {}", names.len(), archive_path.display());
        Ok(())
    }

    /// Rename one entry
    ///
    /// Renaming an entry to its current name is a no-op and does not touch
    /// the archive.
    pub fn rename(&self, archive_path: &Path, old_name: &str, new_name: &str) -> Result<(), ArchiveError> {
        if new_name.is_empty() {
            return Err(ArchiveError::NothingSelected("No new name given".to_string()));
        }
        let handler = self.checked_handler(archive_path, Operation::Rename)?;

        if old_name == new_name {
            log::debug!("Rename of {} skipped, name unchanged", old_name);
            return Ok(());
        }

        handler.rename(archive_path, old_name, new_name)?;
        log::info!("Renamed {} to {} in {}", old_name, new_name, archive_path.display());
        Ok(())
    }

    /// Password-protect every entry and hand the password to the secret store
    pub fn encrypt_archive(&self, archive_path: &Path, password: &str) -> Result<(), ArchiveError> {
        let handler = self.checked_handler(archive_path, Operation::Encrypt)?;

        handler.encrypt_archive(archive_path, password)?;
        self.credentials.store(archive_path, &CredentialScope::Archive, password)?;

        log::info!("Encrypted {}", archive_path.display());
        Ok(())
    }

    /// Password-protect the named entries, each under its own password
    pub fn encrypt_entries(
        &self,
        archive_path: &Path,
        passwords: &HashMap<String, String>,
    ) -> Result<(), ArchiveError> {
        if passwords.is_empty() {
            return Err(ArchiveError::NothingSelected("No entries selected for encryption".to_string()));
        }
        let handler = self.checked_handler(archive_path, Operation::Encrypt)?;

        let mut names: Vec<&String> = passwords.keys().collect();
        names.sort();

        let known: HashSet<String> = handler.list(archive_path)?.into_iter().map(|e| e.name).collect();
        if let Some(missing) = names.iter().find(|name| !known.contains(name.as_str())) {
            log::warn!("Encryption of {} rejected: no entry named {}", archive_path.display(), missing);
            return Err(ArchiveError::EntryNotFound(missing.to_string()));
        }

        handler.encrypt_entries(archive_path, passwords)?;

        for name in names {
            self.credentials
                .store(archive_path, &CredentialScope::Entry(name.clone()), &passwords[name])?;
        }

        log::info!("Encrypted {} entries in {}", passwords.len(), archive_path.display());
        Ok(())
    }

    /// Create a new, empty archive
    ///
    /// An existing file at `archive_path` is never overwritten; the handler
    /// opens the path with `create_new`.
    pub fn create(&self, archive_path: &Path) -> Result<(), ArchiveError> {
        let handler = self.checked_handler(archive_path, Operation::Create)?;
        handler.create(archive_path)
    }

    pub fn add(&self, archive_path: &Path, sources: &[PathBuf]) -> Result<(), ArchiveError> {
        if sources.is_empty() {
            return Err(ArchiveError::NothingSelected("No files selected to add".to_string()));
        }
        let handler = self.checked_handler(archive_path, Operation::Add)?;

        handler.add(archive_path, sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use crate::commands::credentials::MemoryCredentialStore;
    use crate::models::ArchiveFormat;
    use crate::utils::progress::{NoProgress, ProgressEvent};
    use tempfile::TempDir;

    fn service_with_store() -> (ArchiveService, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let service = ArchiveService::new(ArchiverConfig::default(), store.clone()).unwrap();
        (service, store)
    }

    fn service() -> ArchiveService {
        service_with_store().0
    }

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Create `name` inside `dir` with `content` and return its path
    fn source_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_zip_create_add_list_extract() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("P.zip");
        let a = source_file(temp_dir.path(), "a.txt", b"first file");
        let b = source_file(temp_dir.path(), "b.txt", b"second");

        service.create(&zip_path).unwrap();
        service.add(&zip_path, &[a.clone(), b.clone()]).unwrap();

        let entries = service.list(&zip_path).unwrap();
        assert_eq!(
            entries,
            vec![ArchiveEntry::file("a.txt", Some(10)), ArchiveEntry::file("b.txt", Some(6))]
        );

        service
            .extract(&zip_path, &strings(&["a.txt", "b.txt"]), temp_dest.path(), &mut NoProgress)
            .unwrap();
        assert_eq!(fs::read(temp_dest.path().join("a.txt")).unwrap(), fs::read(&a).unwrap());
        assert_eq!(fs::read(temp_dest.path().join("b.txt")).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_zip_delete_keeps_relative_order() {
        let temp_dir = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("xyz.zip");
        let sources: Vec<PathBuf> = ["x", "y", "z"]
            .iter()
            .map(|n| source_file(temp_dir.path(), n, n.as_bytes()))
            .collect();

        service.create(&zip_path).unwrap();
        service.add(&zip_path, &sources).unwrap();
        service.delete(&zip_path, &strings(&["y"])).unwrap();

        let names: Vec<String> = service.list(&zip_path).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["x", "z"]);
    }

    #[test]
    fn test_extract_emits_n_plus_one_events() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("events.zip");
        let sources: Vec<PathBuf> = ["1.txt", "2.txt", "3.txt", "4.txt"]
            .iter()
            .map(|n| source_file(temp_dir.path(), n, b"data"))
            .collect();
        service.create(&zip_path).unwrap();
        service.add(&zip_path, &sources).unwrap();

        let selection = strings(&["3.txt", "1.txt", "4.txt"]);
        let mut events: Vec<ProgressEvent> = Vec::new();
        service.extract(&zip_path, &selection, temp_dest.path(), &mut events).unwrap();

        assert_eq!(events.len(), selection.len() + 1);
        for (i, name) in selection.iter().enumerate() {
            assert_eq!(events[i], ProgressEvent::new(i + 1, 3, name.as_str()));
        }
        assert_eq!(events[3], ProgressEvent::new(3, 3, ""));
    }

    #[test]
    fn test_empty_selection_extracts_everything() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("all.zip");
        let sources = vec![
            source_file(temp_dir.path(), "one.txt", b"1"),
            source_file(temp_dir.path(), "two.txt", b"2"),
        ];
        service.create(&zip_path).unwrap();
        service.add(&zip_path, &sources).unwrap();

        let mut events: Vec<ProgressEvent> = Vec::new();
        service.extract(&zip_path, &[], temp_dest.path(), &mut events).unwrap();

        assert!(temp_dest.path().join("one.txt").exists());
        assert!(temp_dest.path().join("two.txt").exists());
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_extract_from_empty_archive_has_nothing_selected() {
        let temp_dir = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("empty.zip");
        service.create(&zip_path).unwrap();

        let result = service.extract(&zip_path, &[], temp_dir.path(), &mut NoProgress);
        assert!(matches!(result, Err(ArchiveError::NothingSelected(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let service = service();
        let result = service.list(Path::new("archive.xz"));
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
        assert!(service.capabilities(Path::new("archive.iso")).is_err());
    }

    #[test]
    fn test_capabilities_per_format() {
        let service = service();
        assert!(service.capabilities(Path::new("a.zip")).unwrap().encryption);
        assert!(!service.capabilities(Path::new("a.7z")).unwrap().encryption);
        assert_eq!(service.capabilities(Path::new("a.rar")).unwrap(), Capabilities::READ_ONLY);
    }

    #[test]
    fn test_rar_delete_rejected_before_any_io() {
        let service = service();
        // The archive does not exist: the rejection must come from the capability check
        let result = service.delete(Path::new("/nonexistent/dir/locked.rar"), &strings(&["a"]));

        match result {
            Err(ArchiveError::UnsupportedOperation { format, operation }) => {
                assert_eq!(format, ArchiveFormat::Rar);
                assert_eq!(operation, Operation::Delete);
            }
            other => panic!("Expected UnsupportedOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_read_only_formats_rejected_for_every_mutation() {
        let temp_dir = TempDir::new().unwrap();
        let service = service();
        let source = source_file(temp_dir.path(), "a.txt", b"a");

        for ext in ["rar", "tar", "gz", "bz2"] {
            let path = temp_dir.path().join(format!("archive.{}", ext));
            assert!(service.delete(&path, &strings(&["a"])).unwrap_err().is_unsupported_operation());
            assert!(service.rename(&path, "a", "b").unwrap_err().is_unsupported_operation());
            assert!(service.encrypt_archive(&path, "pw").unwrap_err().is_unsupported_operation());
            assert!(service.create(&path).unwrap_err().is_unsupported_operation());
            assert!(service.add(&path, &[source.clone()]).unwrap_err().is_unsupported_operation());
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_sevenzip_encryption_rejected_by_service() {
        let service = service();
        let result = service.encrypt_archive(Path::new("/nowhere/a.7z"), "pw");
        assert!(matches!(
            result,
            Err(ArchiveError::UnsupportedOperation { format: ArchiveFormat::SevenZip, operation: Operation::Encrypt })
        ));
    }

    #[test]
    fn test_empty_selections_rejected() {
        let service = service();
        let path = Path::new("/nowhere/a.zip");

        assert!(matches!(service.delete(path, &[]), Err(ArchiveError::NothingSelected(_))));
        assert!(matches!(service.add(path, &[]), Err(ArchiveError::NothingSelected(_))));
        assert!(matches!(
            service.encrypt_entries(path, &HashMap::new()),
            Err(ArchiveError::NothingSelected(_))
        ));
    }

    #[test]
    fn test_rename_to_same_name_skips_rewrite() {
        let service = service();
        // Would fail with a Rewrite error if the handler were called
        service.rename(Path::new("/nowhere/a.zip"), "a.txt", "a.txt").unwrap();
    }

    #[test]
    fn test_rename_through_service() {
        let temp_dir = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("r.zip");
        service.create(&zip_path).unwrap();
        service.add(&zip_path, &[source_file(temp_dir.path(), "old.txt", b"bytes")]).unwrap();

        service.rename(&zip_path, "old.txt", "new.txt").unwrap();

        assert_eq!(service.list(&zip_path).unwrap(), vec![ArchiveEntry::file("new.txt", Some(5))]);
    }

    #[test]
    fn test_encrypt_archive_stores_master_password() {
        let temp_dir = TempDir::new().unwrap();
        let (service, store) = service_with_store();
        let zip_path = temp_dir.path().join("vault.zip");
        service.create(&zip_path).unwrap();
        service.add(&zip_path, &[source_file(temp_dir.path(), "a.txt", b"a")]).unwrap();

        service.encrypt_archive(&zip_path, "correct horse").unwrap();

        assert_eq!(
            store.get(&zip_path, &CredentialScope::Archive).as_deref(),
            Some("correct horse")
        );
    }

    #[test]
    fn test_encrypt_entries_stores_each_password() {
        let temp_dir = TempDir::new().unwrap();
        let (service, store) = service_with_store();
        let zip_path = temp_dir.path().join("vault.zip");
        service.create(&zip_path).unwrap();
        service
            .add(
                &zip_path,
                &[
                    source_file(temp_dir.path(), "a.txt", b"a"),
                    source_file(temp_dir.path(), "b.txt", b"b"),
                ],
            )
            .unwrap();

        let mut passwords = HashMap::new();
        passwords.insert("a.txt".to_string(), "pw-a".to_string());
        passwords.insert("b.txt".to_string(), "pw-b".to_string());
        service.encrypt_entries(&zip_path, &passwords).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&zip_path, &CredentialScope::Entry("b.txt".to_string())).as_deref(),
            Some("pw-b")
        );
    }

    #[test]
    fn test_encrypt_entries_rejects_unknown_names() {
        let temp_dir = TempDir::new().unwrap();
        let (service, store) = service_with_store();
        let zip_path = temp_dir.path().join("vault.zip");
        service.create(&zip_path).unwrap();
        service.add(&zip_path, &[source_file(temp_dir.path(), "a.txt", b"a")]).unwrap();
        let before = fs::read(&zip_path).unwrap();

        let mut passwords = HashMap::new();
        passwords.insert("a.txt".to_string(), "pw-a".to_string());
        passwords.insert("ghost.txt".to_string(), "pw-ghost".to_string());
        let result = service.encrypt_entries(&zip_path, &passwords);

        assert!(matches!(result, Err(ArchiveError::EntryNotFound(ref name)) if name == "ghost.txt"));
        assert!(store.is_empty());
        assert_eq!(fs::read(&zip_path).unwrap(), before);
    }

    #[test]
    fn test_failed_encryption_stores_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (service, store) = service_with_store();
        let zip_path = temp_dir.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();

        let result = service.encrypt_archive(&zip_path, "pw");

        assert!(matches!(result, Err(ArchiveError::Rewrite { .. })));
        assert!(store.is_empty());
        assert_eq!(fs::read(&zip_path).unwrap(), b"not a zip");
    }

    #[test]
    fn test_create_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let service = service();
        let zip_path = temp_dir.path().join("exists.zip");
        fs::write(&zip_path, b"precious").unwrap();

        let result = service.create(&zip_path);

        assert!(matches!(result, Err(ArchiveError::Filesystem { .. })));
        assert_eq!(fs::read(&zip_path).unwrap(), b"precious");
    }

    #[test]
    fn test_spawn_extract() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let service = service();
        let archive_path = temp_dir.path().join("bg.7z");
        service.create(&archive_path).unwrap();
        service
            .add(&archive_path, &[source_file(temp_dir.path(), "payload.bin", b"0123456789")])
            .unwrap();

        let job = service.spawn_extract(&archive_path, Vec::new(), temp_dest.path()).unwrap();
        let events: Vec<ProgressEvent> = job.events().iter().collect();
        let (result, _) = job.wait();

        result.unwrap();
        assert_eq!(events, vec![ProgressEvent::new(1, 1, "payload.bin"), ProgressEvent::finished(1)]);
        assert_eq!(fs::read(temp_dest.path().join("payload.bin")).unwrap(), b"0123456789");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ArchiverConfig {
            progress_capacity: 0,
            ..ArchiverConfig::default()
        };
        let result = ArchiveService::new(config, Arc::new(MemoryCredentialStore::new()));
        assert!(matches!(result, Err(ArchiveError::InvalidConfig(_))));
    }
}
