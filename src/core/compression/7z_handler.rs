use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader, SevenZWriter};
use crate::core::compression::common::{extract_in_order, ArchiveHandler};
use crate::core::file_ops::paths::{
    create_entry_dir, extraction_target, normalize_entry_name, same_entry, write_entry,
};
use crate::core::file_ops::rewrite::{create_archive, rewrite_archive};
use crate::core::file_ops::sources::{collect_sources, SourceFile};
use crate::models::{ArchiveEntry, ArchiveError, ArchiveFormat, ArchiverConfig};
use crate::utils::progress::ProgressSink;

/// 7z archive handler
///
/// Deletion, renaming and adding are implemented as a full decode and
/// re-encode through the safe rewrite protocol. Encryption is not offered
/// for 7z and is ignored.
pub struct SevenZHandler {
    temp_suffix: String,
}

/// What a rewrite pass does with one existing entry
enum EntryAction {
    Keep,
    Drop,
    Rename(String),
}

impl SevenZHandler {
    pub fn new() -> Self {
        Self::with_config(&ArchiverConfig::default())
    }

    pub fn with_config(config: &ArchiverConfig) -> Self {
        Self {
            temp_suffix: config.temp_suffix.clone(),
        }
    }

    fn open(&self, archive_path: &Path) -> Result<SevenZReader<File>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open 7z archive: {}", e)))?;

        // Get file size
        let file_size = file
            .metadata()
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to get file metadata: {}", e)))?
            .len();

        SevenZReader::new(file, file_size, Password::empty())
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to read 7z archive: {}", e)))
    }

    /// Decode every entry of the archive into a spool file
    ///
    /// # Returns
    /// * Entries in container order, and the spooled payload of every file
    ///   entry
    fn decode_all(&self, archive_path: &Path) -> Result<(Vec<SevenZArchiveEntry>, Spool), ArchiveError> {
        let mut reader = self.open(archive_path)?;
        let entries = reader.archive().files.clone();
        let mut spool = Spool::new()
            .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to create spool file: {}", e)))?;

        reader
            .for_each_entries(|entry, data| {
                if !entry.is_directory() {
                    spool.push(entry.name(), data).map_err(sevenz_rust::Error::io)?;
                }
                Ok(true)
            })
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to decode 7z archive: {}", e)))?;

        Ok((entries, spool))
    }

    /// Re-encode the archive into a temp file and swap it in
    ///
    /// # Arguments
    /// * `plan` - Decides per existing entry whether it is kept, dropped or renamed
    /// * `additions` - New files appended after the existing entries
    ///
    /// # Behavior
    /// - Entry order is preserved
    /// - Two entries ending up with the same name fail the rewrite
    fn rewrite_with<F>(
        &self,
        archive_path: &Path,
        mut plan: F,
        additions: &[SourceFile],
    ) -> Result<(), ArchiveError>
    where
        F: FnMut(&SevenZArchiveEntry) -> EntryAction,
    {
        rewrite_archive(archive_path, &self.temp_suffix, |temp| {
            // === Step 1: Decode the original ===
            let (entries, spool) = self.decode_all(archive_path)?;

            let mut writer = SevenZWriter::new(temp)
                .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to create 7z writer: {}", e)))?;
            let mut taken: HashSet<String> = HashSet::with_capacity(entries.len() + additions.len());

            // === Step 2: Re-encode surviving entries ===
            for mut entry in entries {
                let original_name = entry.name().to_string();
                let new_name = match plan(&entry) {
                    EntryAction::Drop => {
                        log::debug!("Dropping {} from {}", original_name, archive_path.display());
                        continue;
                    }
                    EntryAction::Keep => original_name.clone(),
                    EntryAction::Rename(name) => name,
                };
                claim_name(archive_path, &mut taken, &new_name)?;
                entry.name = new_name;

                let payload = if entry.is_directory() {
                    None
                } else {
                    spool.reader(&original_name).map_err(|e| ArchiveError::rewrite(
                        archive_path,
                        format!("Failed to read back entry {}: {}", original_name, e),
                    ))?
                };
                let pushed = match payload {
                    Some(data) => writer.push_archive_entry(entry, Some(data)),
                    None => writer.push_archive_entry::<&[u8]>(entry, None),
                };
                pushed.map_err(|e| ArchiveError::rewrite(
                    archive_path,
                    format!("Failed to write entry {}: {}", original_name, e),
                ))?;
            }

            // === Step 3: Append new files ===
            for item in additions {
                claim_name(archive_path, &mut taken, &item.entry_name)?;

                let mut input = File::open(&item.path).map_err(|e| ArchiveError::fs(&item.path, e))?;
                writer
                    .push_archive_entry(
                        SevenZArchiveEntry::from_path(&item.path, item.entry_name.clone()),
                        Some(&mut input),
                    )
                    .map_err(|e| ArchiveError::rewrite(
                        archive_path,
                        format!("Failed to add file {} to archive: {}", item.entry_name, e),
                    ))?;
            }

            writer
                .finish()
                .map_err(|e| ArchiveError::rewrite(archive_path, format!("Failed to finalize 7z archive: {}", e)))?;
            Ok(())
        })
    }
}

/// Decoded entry payloads, laid end to end in one anonymous temp file
///
/// Keeps a rewrite's memory use independent of the archive size.
struct Spool {
    file: File,
    ranges: HashMap<String, (u64, u64)>,
    end: u64,
}

impl Spool {
    fn new() -> io::Result<Self> {
        Ok(Self {
            file: tempfile::tempfile()?,
            ranges: HashMap::new(),
            end: 0,
        })
    }

    /// Append the payload of entry `name`
    fn push(&mut self, name: &str, data: &mut dyn Read) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        let len = io::copy(data, &mut self.file)?;
        self.ranges.insert(name.to_string(), (self.end, len));
        self.end += len;
        Ok(())
    }

    /// Reader over the payload of entry `name`, if one was spooled
    fn reader(&self, name: &str) -> io::Result<Option<Take<&File>>> {
        let Some(&(offset, len)) = self.ranges.get(name) else {
            return Ok(None);
        };
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Some(file.take(len)))
    }
}

fn claim_name(archive_path: &Path, taken: &mut HashSet<String>, name: &str) -> Result<(), ArchiveError> {
    if taken.insert(name.to_string()) {
        Ok(())
    } else {
        Err(ArchiveError::rewrite(archive_path, format!("An entry named {} already exists", name)))
    }
}

impl ArchiveHandler for SevenZHandler {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let reader = self.open(archive_path)?;

        Ok(reader
            .archive()
            .files
            .iter()
            .map(|entry| {
                let name = normalize_entry_name(entry.name());
                if entry.is_directory() {
                    ArchiveEntry::directory(name)
                } else {
                    ArchiveEntry::file(name, Some(entry.size()))
                }
            })
            .collect())
    }

    /// Extract the named entries
    ///
    /// # Behavior
    /// - Each name is located by a fresh sequential scan (7z has no random access)
    /// - Preserves directory hierarchy
    /// - Does not support password-protected archives
    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        // Fail with FormatRead before the batch starts
        drop(self.open(archive_path)?);

        extract_in_order(names, dest_dir, progress, |name| {
            let output_path = extraction_target(dest_dir, name)?;
            let mut reader = self.open(archive_path)?;
            let mut outcome: Option<Result<(), ArchiveError>> = None;

            reader
                .for_each_entries(|entry, data| {
                    if !same_entry(&normalize_entry_name(entry.name()), name) {
                        // Skipped entries still have to be consumed to reach the next one
                        io::copy(data, &mut io::sink()).map_err(sevenz_rust::Error::io)?;
                        return Ok(true);
                    }

                    outcome = Some(if entry.is_directory() {
                        create_entry_dir(&output_path)
                    } else {
                        write_entry(data, name, &output_path).map(|_| ())
                    });
                    Ok(false)
                })
                .map_err(|e| ArchiveError::extraction(name, e))?;

            outcome.unwrap_or_else(|| Err(ArchiveError::extraction(name, "Entry not found in archive")))
        })
    }

    fn delete(&self, archive_path: &Path, names: &[String]) -> Result<(), ArchiveError> {
        let doomed: HashSet<&str> = names.iter().map(String::as_str).collect();

        self.rewrite_with(
            archive_path,
            |entry| {
                if doomed.contains(normalize_entry_name(entry.name()).as_str()) {
                    EntryAction::Drop
                } else {
                    EntryAction::Keep
                }
            },
            &[],
        )
    }

    fn rename(&self, archive_path: &Path, old_name: &str, new_name: &str) -> Result<(), ArchiveError> {
        self.rewrite_with(
            archive_path,
            |entry| {
                if normalize_entry_name(entry.name()) == old_name {
                    EntryAction::Rename(new_name.to_string())
                } else {
                    EntryAction::Keep
                }
            },
            &[],
        )
    }

    fn create(&self, archive_path: &Path) -> Result<(), ArchiveError> {
        let codec_failure = |e: sevenz_rust::Error| {
            ArchiveError::fs(archive_path, io::Error::new(io::ErrorKind::Other, e.to_string()))
        };

        create_archive(archive_path, |file| {
            SevenZWriter::new(file).map_err(codec_failure)?.finish().map_err(|e| codec_failure(e.into()))?;
            Ok(())
        })
    }

    fn add(&self, archive_path: &Path, sources: &[PathBuf]) -> Result<(), ArchiveError> {
        let sources = collect_sources(sources)?;
        self.rewrite_with(archive_path, |_| EntryAction::Keep, &sources)?;

        log::info!("Added {} file(s) to {}", sources.len(), archive_path.display());
        Ok(())
    }
}

impl Default for SevenZHandler {
    fn default() -> Self {
        Self::new()
    }
}
