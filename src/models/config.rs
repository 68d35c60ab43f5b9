use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::models::ArchiveError;

/// Process-wide archiver configuration
///
/// Loaded once at startup and handed to `FormatRegistry::new`; every field
/// has a default so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchiverConfig {
    /// Suffix of the temporary file written during a safe rewrite
    pub temp_suffix: String,
    /// Bound of the background extraction event channel
    pub progress_capacity: usize,
    /// Compression used for zip entries written by add/encrypt
    pub zip_compression: ZipCompression,
    /// Optional compression level for deflated zip entries
    pub zip_compression_level: Option<i64>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            temp_suffix: ".temp".to_string(),
            progress_capacity: 64,
            zip_compression: ZipCompression::Deflated,
            zip_compression_level: None,
        }
    }
}

impl ArchiverConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ArchiveError> {
        let config: ArchiverConfig = serde_json::from_str(json)
            .map_err(|e| ArchiveError::InvalidConfig(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self, ArchiveError> {
        let json = fs::read_to_string(path).map_err(|e| ArchiveError::fs(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.progress_capacity == 0 {
            return Err(ArchiveError::InvalidConfig(
                "progressCapacity must be at least 1".to_string(),
            ));
        }

        let suffix = self.temp_suffix.trim_start_matches('.');
        if suffix.is_empty() || self.temp_suffix.contains(['/', '\\']) {
            return Err(ArchiveError::InvalidConfig(format!(
                "tempSuffix must be a plain file suffix, got {:?}",
                self.temp_suffix
            )));
        }

        Ok(())
    }
}

/// Compression method for newly written zip entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZipCompression {
    Stored,
    Deflated,
}
