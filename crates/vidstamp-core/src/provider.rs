use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest prefix worth fetching. Camera output keeps `moov` well inside
/// the first megabyte when the recorder finalizes properly.
pub const PREFIX_FLOOR_BYTES: u64 = 1024 * 1024;

/// Largest prefix ever fetched, regardless of file size.
pub const PREFIX_CEILING_BYTES: u64 = 10 * 1024 * 1024;

/// Bytes to request for a file of `file_size` bytes: a tenth of the file,
/// clamped to [1 MiB, 10 MiB].
pub fn prefix_fetch_size(file_size: u64) -> u64 {
    (file_size / 10).clamp(PREFIX_FLOOR_BYTES, PREFIX_CEILING_BYTES)
}

/// Provider-reported facts about one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttributes {
    pub name: String,
    pub size: u64,
    /// Creation time as the provider sees it. For cloud storage this is
    /// the upload time, not the capture time.
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// One neighbor candidate for sequence interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiblingFile {
    /// Counter parsed from the sibling's name.
    pub sequence: u64,
    pub name: String,
    /// Already-known timestamp for the sibling, if any.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Failure at the storage boundary. The extraction pipeline absorbs all of
/// these into the strategy cascade; the variants exist so logs and tests
/// can be precise about causes.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Storage backend the engine reads through. Calls block; the engine makes
/// at most one `fetch_prefix` and one `list_siblings` call per file.
pub trait StorageProvider {
    /// First `max_bytes` bytes of the file, fewer when the file is shorter.
    fn fetch_prefix(&self, file_id: &str, max_bytes: u64) -> Result<Vec<u8>, ProviderError>;

    /// Name, size, and provider-reported times.
    fn file_attributes(&self, file_id: &str) -> Result<FileAttributes, ProviderError>;

    /// Files in the same parent collection whose names start with `prefix`,
    /// including the queried file itself if it matches.
    fn list_siblings(&self, file_id: &str, prefix: &str) -> Result<Vec<SiblingFile>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_size_scales_with_file() {
        assert_eq!(prefix_fetch_size(50 * 1024 * 1024), 5 * 1024 * 1024);
    }

    #[test]
    fn test_prefix_size_floor() {
        assert_eq!(prefix_fetch_size(0), PREFIX_FLOOR_BYTES);
        assert_eq!(prefix_fetch_size(2 * 1024 * 1024), PREFIX_FLOOR_BYTES);
    }

    #[test]
    fn test_prefix_size_ceiling() {
        assert_eq!(prefix_fetch_size(4 * 1024 * 1024 * 1024), PREFIX_CEILING_BYTES);
    }
}
