//! # Persistence Module
//!
//! On-disk formats for the profile store and the atomic write helper both files go
//! through.
//!
//! ## Index File Format
//!
//! The index file is a bincode payload followed by a little-endian CRC32 of that payload:
//!
//! ```text
//! +---------------------------------------------------------------+-----------+
//! | IndexFile { magic, version, dimension, count, values[] }      | crc32 LE  |
//! +---------------------------------------------------------------+-----------+
//! ```
//!
//! `values` holds `count * dimension` floats, vector after vector in insertion order.
//!
//! ## Writes
//!
//! [`write_atomic`] writes to a sibling `*.tmp` file, syncs it, and renames it over the
//! target, so a crash leaves either the old file or the new one.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// "NTIX" in ASCII
pub const INDEX_MAGIC: u32 = 0x4E54_4958;

pub const INDEX_VERSION: u16 = 1;

const CHECKSUM_LEN: usize = 4;

/// Error types for persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u16, actual: u16 },

    #[error("Checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Serialized form of a flat index
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexFile {
    pub magic: u32,
    pub version: u16,
    pub dimension: u32,
    pub count: u64,
    pub values: Vec<f64>,
}

impl IndexFile {
    pub fn new(dimension: usize, values: Vec<f64>) -> Self {
        let count = if dimension == 0 { 0 } else { values.len() / dimension };
        Self {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dimension: dimension as u32,
            count: count as u64,
            values,
        }
    }
}

/// Encode an index payload and append its checksum.
pub fn encode_index(file: &IndexFile) -> Result<Vec<u8>, PersistenceError> {
    let mut data = bincode::serialize(file)?;
    let checksum = crc32fast::hash(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    Ok(data)
}

/// Decode and validate an index file. Dimension is checked by the caller.
pub fn decode_index(bytes: &[u8]) -> Result<IndexFile, PersistenceError> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(PersistenceError::InvalidFormat(format!(
            "index file too small ({} bytes)",
            bytes.len()
        )));
    }

    let (payload, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(trailer);
    let stored = u32::from_le_bytes(stored);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(PersistenceError::ChecksumMismatch { stored, computed });
    }

    let file: IndexFile = bincode::deserialize(payload)?;

    if file.magic != INDEX_MAGIC {
        return Err(PersistenceError::InvalidFormat(format!(
            "invalid index magic number: {:08x}",
            file.magic
        )));
    }

    if file.version != INDEX_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: INDEX_VERSION,
            actual: file.version,
        });
    }

    let expected_len = (file.count as usize).checked_mul(file.dimension as usize);
    if expected_len != Some(file.values.len()) {
        return Err(PersistenceError::InvalidFormat(format!(
            "index declares {} vectors of dimension {} but holds {} values",
            file.count,
            file.dimension,
            file.values.len()
        )));
    }

    Ok(file)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the file at `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read a file, treating a missing file as `None`.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> IndexFile {
        IndexFile::new(2, vec![0.1, 0.2, 0.3, 0.4])
    }

    #[test]
    fn test_index_file_counts_vectors() {
        let file = sample();
        assert_eq!(file.count, 2);
        assert_eq!(file.dimension, 2);
        assert_eq!(file.magic, INDEX_MAGIC);
    }

    #[test]
    fn test_encode_and_decode_index() {
        let bytes = encode_index(&sample()).unwrap();
        let decoded = decode_index(&bytes).unwrap();
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.values, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_decode_rejects_flipped_byte() {
        let mut bytes = encode_index(&sample()).unwrap();
        bytes[10] ^= 0xFF;
        let result = decode_index(&bytes);
        assert!(matches!(result.unwrap_err(), PersistenceError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_short_file() {
        let result = decode_index(&[1, 2]);
        assert!(matches!(result.unwrap_err(), PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        let mut file = sample();
        file.magic = 0xDEAD_BEEF;
        let bytes = encode_index(&file).unwrap();
        assert!(matches!(decode_index(&bytes).unwrap_err(), PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn test_decode_rejects_version_mismatch() {
        let mut file = sample();
        file.version = 9;
        let bytes = encode_index(&file).unwrap();
        assert!(matches!(
            decode_index(&bytes).unwrap_err(),
            PersistenceError::VersionMismatch { expected: 1, actual: 9 }
        ));
    }

    #[test]
    fn test_decode_rejects_count_mismatch() {
        let mut file = sample();
        file.count = 3;
        let bytes = encode_index(&file).unwrap();
        assert!(matches!(decode_index(&bytes).unwrap_err(), PersistenceError::InvalidFormat(_)));
    }

    #[test]
    fn test_write_atomic_creates_parent_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("metadata.json");

        write_atomic(&path, b"[]").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"[]");
        assert!(!temp_dir.path().join("nested").join("metadata.json.tmp").exists());
    }

    #[test]
    fn test_read_if_exists_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_if_exists(&temp_dir.path().join("absent.index")).unwrap();
        assert!(result.is_none());
    }
}
