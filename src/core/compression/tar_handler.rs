use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::{Archive, Entry};
use crate::core::compression::common::{extract_in_order, ArchiveHandler};
use crate::core::file_ops::paths::{extraction_target, normalize_entry_name, same_entry};
use crate::models::{ArchiveEntry, ArchiveError, ArchiveFormat};
use crate::utils::progress::ProgressSink;

/// TAR archive handler
///
/// Read and extract only; mutating operations are ignored. A `.tar` whose
/// content is gzip or bzip2 compressed is decoded transparently.
pub struct TarHandler;

/// Outer compression detected from the first bytes of a `.tar` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarCompression {
    None,
    Gzip,
    Bzip2,
}

impl TarCompression {
    fn sniff(magic: &[u8]) -> Self {
        if magic.starts_with(&[0x1f, 0x8b]) {
            TarCompression::Gzip
        } else if magic.starts_with(b"BZh") {
            TarCompression::Bzip2
        } else {
            TarCompression::None
        }
    }
}

impl TarHandler {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, archive_path: &Path) -> Result<Archive<Box<dyn Read>>, ArchiveError> {
        let file = File::open(archive_path)
            .map_err(|e| ArchiveError::read(archive_path, format!("Failed to open TAR archive: {}", e)))?;
        let mut reader = BufReader::new(file);

        let compression = {
            let magic = reader
                .fill_buf()
                .map_err(|e| ArchiveError::read(archive_path, format!("Failed to read TAR archive: {}", e)))?;
            TarCompression::sniff(magic)
        };
        log::debug!("Opening {} as {:?} tarball", archive_path.display(), compression);

        let stream: Box<dyn Read> = match compression {
            TarCompression::Gzip => Box::new(GzDecoder::new(reader)),
            TarCompression::Bzip2 => Box::new(BzDecoder::new(reader)),
            TarCompression::None => Box::new(reader),
        };
        Ok(Archive::new(stream))
    }
}

fn entry_name<R: Read>(entry: &Entry<'_, R>) -> String {
    normalize_entry_name(&String::from_utf8_lossy(&entry.path_bytes()))
}

impl ArchiveHandler for TarHandler {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut archive = self.open(archive_path)?;
        let read_error = |e: std::io::Error| ArchiveError::read(archive_path, format!("Failed to read TAR entry: {}", e));

        let mut entries = Vec::new();
        for entry in archive.entries().map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            let name = entry_name(&entry);

            entries.push(if entry.header().entry_type().is_dir() {
                ArchiveEntry::directory(name)
            } else {
                ArchiveEntry::file(name, Some(entry.size()))
            });
        }

        Ok(entries)
    }

    /// Extract the named entries
    ///
    /// # Behavior
    /// - Each name is located by a fresh sequential scan of the stream
    /// - Unpacking goes through `tar`'s own path sanitization as well
    fn extract(
        &self,
        archive_path: &Path,
        names: &[String],
        dest_dir: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), ArchiveError> {
        drop(self.open(archive_path)?);

        extract_in_order(names, dest_dir, progress, |name| {
            extraction_target(dest_dir, name)?;
            let mut archive = self.open(archive_path)?;

            let entries = archive.entries().map_err(|e| ArchiveError::extraction(name, e))?;
            for entry in entries {
                let mut entry = entry.map_err(|e| ArchiveError::extraction(name, e))?;
                if !same_entry(&entry_name(&entry), name) {
                    continue;
                }

                let unpacked = entry
                    .unpack_in(dest_dir)
                    .map_err(|e| ArchiveError::extraction(name, e))?;
                if !unpacked {
                    return Err(ArchiveError::extraction(name, "Entry path escapes the destination directory"));
                }
                return Ok(());
            }

            Err(ArchiveError::extraction(name, "Entry not found in archive"))
        })
    }
}

impl Default for TarHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use crate::models::Capabilities;
    use crate::utils::progress::{NoProgress, ProgressEvent};
    use tempfile::TempDir;

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn create_test_tar(path: &Path, entries: &[(&str, &[u8])]) {
        fs::write(path, tar_bytes(entries)).unwrap();
    }

    #[test]
    fn test_list_reports_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("test.tar");
        create_test_tar(&archive_path, &[("a.txt", b"alpha"), ("dir/b.txt", b"bb")]);

        let entries = TarHandler::new().list(&archive_path).unwrap();

        assert_eq!(
            entries,
            vec![ArchiveEntry::file("a.txt", Some(5)), ArchiveEntry::file("dir/b.txt", Some(2))]
        );
    }

    #[test]
    fn test_list_gzip_compressed_tar() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("packed.tar");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes(&[("inner.txt", b"inside")])).unwrap();
        fs::write(&archive_path, encoder.finish().unwrap()).unwrap();

        let entries = TarHandler::new().list(&archive_path).unwrap();
        assert_eq!(entries, vec![ArchiveEntry::file("inner.txt", Some(6))]);
    }

    #[test]
    fn test_extract_selected_entries() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("test.tar");
        create_test_tar(&archive_path, &[("a.txt", b"alpha"), ("dir/b.txt", b"bravo")]);

        let mut events: Vec<ProgressEvent> = Vec::new();
        TarHandler::new()
            .extract(&archive_path, &["dir/b.txt".to_string()], temp_dest.path(), &mut events)
            .unwrap();

        assert_eq!(fs::read(temp_dest.path().join("dir/b.txt")).unwrap(), b"bravo");
        assert!(!temp_dest.path().join("a.txt").exists());
        assert_eq!(events, vec![ProgressEvent::new(1, 1, "dir/b.txt"), ProgressEvent::finished(1)]);
    }

    #[test]
    fn test_extract_missing_entry_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("test.tar");
        create_test_tar(&archive_path, &[("a.txt", b"alpha")]);

        let result = TarHandler::new().extract(
            &archive_path,
            &["missing.txt".to_string(), "a.txt".to_string()],
            temp_dest.path(),
            &mut NoProgress,
        );

        assert!(matches!(result, Err(ArchiveError::Extraction { ref entry, .. }) if entry == "missing.txt"));
        assert!(!temp_dest.path().join("a.txt").exists());
    }

    #[test]
    fn test_mutations_are_silent_no_ops() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("keep.tar");
        create_test_tar(&archive_path, &[("a.txt", b"alpha")]);
        let before = fs::read(&archive_path).unwrap();
        let handler = TarHandler::new();

        assert_eq!(handler.capabilities(), Capabilities::READ_ONLY);
        for _ in 0..2 {
            handler.delete(&archive_path, &["a.txt".to_string()]).unwrap();
        }
        handler.rename(&archive_path, "a.txt", "b.txt").unwrap();
        handler.encrypt_archive(&archive_path, "pw").unwrap();
        handler.add(&archive_path, &[temp_dir.path().join("whatever.txt")]).unwrap();
        handler.create(&temp_dir.path().join("new.tar")).unwrap();

        assert_eq!(fs::read(&archive_path).unwrap(), before);
        assert!(!temp_dir.path().join("new.tar").exists());
    }

    #[test]
    fn test_list_missing_archive() {
        let result = TarHandler::new().list(Path::new("/nonexistent/archive.tar"));
        assert!(matches!(result, Err(ArchiveError::FormatRead { .. })));
    }
}
