use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};
use zip::write::FileOptions;
use crate::core::compression::common::{extract_in_order, ArchiveHandler};
use crate::core::file_ops::paths::{create_entry_dir, write_entry};
use crate::core::file_ops::rewrite::{create_archive, rewrite_archive};
use crate::core::file_ops::sources::collect_sources;
use crate::models::{ArchiveEntry, ArchiveError, ArchiveFormat, ArchiverConfig, ZipCompression};
use crate::utils::progress::ProgressSink;

/// ZIP archive handler
///
/// Supports every operation. Mutations stream the original into a fresh
/// archive through the safe rewrite protocol; untouched entries are copied
/// raw (still compressed), so their bytes never change.
pub struct ZipHandler {
    compression: CompressionMethod,
    compression_level: Option<i64>,
    temp_suffix: String,
}

type ZipSource = ZipArchive<File>;
type ZipTarget<'a> = ZipWriter<&'a mut File>;

impl ZipHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        let compression = match config.zip_compression {
            ZipCompression::Stored => CompressionMethod::Stored,
            ZipCompression::Deflated => CompressionMethod::Deflated,
        };

        Self {
            compression,
            compression_level: config.zip_compression_level,
            temp_suffix: config.temp_suffix.clone(),
        }
    }

    fn open(&self, archive_path: &Path) -> Result<ZipSource, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open ZIP archive: {}", e)))?;

        ZipArchive::new(file)
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to read ZIP archive: {}", e)))
    }

    /// Options for entries this handler writes itself
    fn entry_options<'k>(&self) -> FileOptions<'k, ()> {
        let options = FileOptions::<()>::default().compression_method(self.compression);
        match self.compression {
            CompressionMethod::Stored => options,
            _ => options.compression_level(self.compression_level),
        }
    }

    /// Run one rewrite pass over `archive_path`
    ///
    /// `transform` receives the opened original and a writer on the temp
    /// file. The archive comment is carried over before it runs.
    fn rewrite_with<F>(&self, archive_path: &Path, transform: F) -> Result<(), ArchiveError>
    where
        F: FnOnce(&mut ZipSource, &mut ZipTarget<'_>) -> Result<(), ArchiveError>,
    {
        rewrite_archive(archive_path, &self.temp_suffix, |temp| {
            let mut source = self.open(archive_path)?;
            let mut writer = ZipWriter::new(temp);
            writer.set_raw_comment(source.comment().to_vec().into_boxed_slice());

            transform(&mut source, &mut writer)?;

            writer
                .finish()
                .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to finalize ZIP archive: {}", e)))?;
            Ok(())
        })
    }

    /// Decompress entry `index` and write it back under `password`
    fn copy_encrypted(
        &self,
        archive_path: &Path,
        source: &mut ZipSource,
        index: usize,
        writer: &mut ZipTarget<'_>,
        password: &str,
    ) -> Result<(), ArchiveError> {
        let is_dir = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?.is_dir();
        if is_dir {
            let raw = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?;
            return writer.raw_copy_file(raw).map_err(|e| copy_failure(archive_path, index, e));
        }

        let mut file = source.by_index(index).map_err(|e| copy_failure(archive_path, index, e))?;
        let name = file.name().to_string();

        let mut options = self.entry_options().with_aes_encryption(AesMode::Aes256, password);
        if let Some(mode) = file.unix_mode() {
            options = options.unix_permissions(mode);
        }

        writer
            .start_file(name.clone(), options)
            .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to start encrypted entry {}: {}", name, e)))?;
        io::copy(&mut file, writer)
            .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to encrypt entry {}: {}", name, e)))?;

        Ok(())
    }
}

fn copy_failure(archive_path: &Path, index: usize, e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::rewrite(archive_path, format!("Failed to copy entry at index {}: {}", index, e))
}

impl ArchiveHandler for ZipHandler {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = self.open(archive_path)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| ArchiveError::read(archive_path, format!("Failed to read entry at index {}: {}", i, e)))?;

            entries.push(if file.is_dir() {
                ArchiveEntry::directory(file.name())
            } else {
                ArchiveEntry::file(file.name(), Some(file.size()))
            });
        }

        Ok(entries)
    }

    /// Extract the named entries
    ///
    /// # Behavior
    /// - Preserves directory hierarchy
    /// - Rejects names that would escape `dest_dir`
    /// - Sets file permissions on Unix systems
    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        let mut archive = self.open(archive_path)?;

        extract_in_order(names, dest_dir, progress, |name| {
            let mut file = archive
                .by_name(name)
                .map_err(|e| ArchiveError::extraction(name, e))?;

            let relative = file
                .enclosed_name()
                .ok_or_else(|| ArchiveError::extraction(name, "Entry path escapes the destination directory"))?;
            let output_path = dest_dir.join(relative);

            if file.is_dir() {
                return create_entry_dir(&output_path);
            }

            write_entry(&mut file, name, &output_path)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    fs::set_permissions(&output_path, fs::Permissions::from_mode(mode))
                        .map_err(|e| ArchiveError::fs(&output_path, e))?;
                }
            }

            Ok(())
        })
    }

    fn delete(&self, archive_path: &Path, names: &[String]) -> Result<(), ArchiveError> {
        let doomed: HashSet<&str> = names.iter().map(String::as_str).collect();

        self.rewrite_with(archive_path, |source, writer| {
            for index in 0..source.len() {
                let file = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?;
                if doomed.contains(file.name()) {
                    log::debug!("Dropping {} from {}", file.name(), archive_path.display());
                    continue;
                }
                writer.raw_copy_file(file).map_err(|e| copy_failure(archive_path, index, e))?;
            }
            Ok(())
        })
    }

    fn rename(&self, archive_path: &Path, old_name: &str, new_name: &str) -> Result<(), ArchiveError> {
        self.rewrite_with(archive_path, |source, writer| {
            if old_name != new_name && source.file_names().any(|n| n == new_name) {
                return Err(ArchiveError::rewrite(
                    archive_path,
                    format!("An entry named {} already exists", new_name),
                ));
            }

            for index in 0..source.len() {
                let file = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?;
                if file.name() == old_name {
                    writer
                        .raw_copy_file_rename(file, new_name.to_string())
                        .map_err(|e| copy_failure(archive_path, index, e))?;
                } else {
                    writer.raw_copy_file(file).map_err(|e| copy_failure(archive_path, index, e))?;
                }
            }
            Ok(())
        })
    }

    /// Re-write every entry with AES-256 under `password`
    fn encrypt_archive(&self, archive_path: &Path, password: &str) -> Result<(), ArchiveError> {
        self.rewrite_with(archive_path, |source, writer| {
            for index in 0..source.len() {
                self.copy_encrypted(archive_path, source, index, writer, password)?;
            }
            Ok(())
        })
    }

    fn encrypt_entries(
        &self,
        archive_path: &Path,
        passwords: &HashMap<String, String>,
    ) -> Result<(), ArchiveError> {
        self.rewrite_with(archive_path, |source, writer| {
            for index in 0..source.len() {
                let name = source
                    .by_index_raw(index)
                    .map_err(|e| copy_failure(archive_path, index, e))?
                    .name()
                    .to_string();

                match passwords.get(&name) {
                    Some(password) => self.copy_encrypted(archive_path, source, index, writer, password)?,
                    None => {
                        let raw = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?;
                        writer.raw_copy_file(raw).map_err(|e| copy_failure(archive_path, index, e))?;
                    }
                }
            }
            Ok(())
        })
    }

    fn create(&self, archive_path: &Path) -> Result<(), ArchiveError> {
        create_archive(archive_path, |file| {
            ZipWriter::new(file)
                .finish()
                .map_err(|e| ArchiveError::fs(archive_path, io::Error::new(io::ErrorKind::Other, e)))?;
            Ok(())
        })
    }

    /// Append files to the archive
    ///
    /// # Behavior
    /// - Existing entries are copied raw, new ones follow in input order
    /// - A name already present in the archive fails the whole operation
    fn add(&self, archive_path: &Path, sources: &[PathBuf]) -> Result<(), ArchiveError> {
        let sources = collect_sources(sources)?;

        self.rewrite_with(archive_path, |source, writer| {
            let mut taken: HashSet<String> = HashSet::with_capacity(source.len() + sources.len());

            // === Step 1: Carry over existing entries ===
            for index in 0..source.len() {
                let file = source.by_index_raw(index).map_err(|e| copy_failure(archive_path, index, e))?;
                taken.insert(file.name().to_string());
                writer.raw_copy_file(file).map_err(|e| copy_failure(archive_path, index, e))?;
            }

            // === Step 2: Append new files ===
            for item in &sources {
                if !taken.insert(item.entry_name.clone()) {
                    return Err(ArchiveError::rewrite(
                        archive_path,
                        format!("An entry named {} already exists", item.entry_name),
                    ));
                }

                let mut input = File::open(&item.path).map_err(|e| ArchiveError::fs(&item.path, e))?;
                writer
                    .start_file(item.entry_name.clone(), self.entry_options())
                    .map_err(|e| ArchiveError::rewrite(
                        archive_path,
                        format!("Failed to start file {} in archive: {}", item.entry_name, e),
                    ))?;
                io::copy(&mut input, writer)
                    .map_err(|e| ArchiveError::rewrite(
                        archive_path,
                        format!("Failed to write file {} to archive: {}", item.entry_name, e),
                    ))?;
            }

            Ok(())
        })?;

        log::info!("Added {} file(s) to {}", sources.len(), archive_path.display());
        Ok(())
    }
}

impl Default for ZipHandler {
    fn default() -> Self {
        Self::new()
    }
}
