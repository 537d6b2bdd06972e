//! Blob storage port for export artifacts.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Blob storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Storage backend for export artifacts.
pub trait BlobStorage: Send + Sync {
    /// Store bytes at a path, replacing any existing blob.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// Fetch the bytes at a path.
    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    /// Whether a blob exists at the path.
    fn exists(&self, path: &str) -> Result<bool, StorageError>;
    /// Delete the blob at the path. Deleting a missing blob is not an
    /// error; cleanup sweeps re-run safely.
    fn delete(&self, path: &str) -> Result<(), StorageError>;
    /// Size in bytes of the blob at the path.
    fn size(&self, path: &str) -> Result<u64, StorageError>;
}

/// Filesystem-backed storage rooted at a directory.
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    /// Create storage rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStorage for LocalBlobStorage {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_path(path);
        if !full.exists() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(std::fs::read(full)?)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.full_path(path).exists())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if full.exists() {
            std::fs::remove_file(full)?;
        }
        Ok(())
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.full_path(path);
        if !full.exists() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(std::fs::metadata(full)?.len())
    }
}

/// In-memory storage for tests.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStorage for MemoryBlobStorage {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs.write().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.blobs.read().contains_key(path))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.blobs.write().remove(path);
        Ok(())
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        self.blobs
            .read()
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());
        storage.put("exports/u1/a.json", b"{}").unwrap();
        assert!(storage.exists("exports/u1/a.json").unwrap());
        assert_eq!(storage.get("exports/u1/a.json").unwrap(), b"{}");
        assert_eq!(storage.size("exports/u1/a.json").unwrap(), 2);
        storage.delete("exports/u1/a.json").unwrap();
        assert!(!storage.exists("exports/u1/a.json").unwrap());
        // Deleting again is fine.
        storage.delete("exports/u1/a.json").unwrap();
    }

    #[test]
    fn test_memory_storage_missing_blob() {
        let storage = MemoryBlobStorage::new();
        assert!(matches!(
            storage.get("nope"),
            Err(StorageError::NotFound(_))
        ));
    }
}
