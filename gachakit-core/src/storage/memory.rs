//! In-memory blob store.
//!
//! Nothing written here survives the process. Useful for tests and for
//! sessions where the host has no writable storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::{StorageError, StorageResult};
use super::traits::AtomicBlobStore;

/// In-memory atomic blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicU64,
}

impl MemoryBlobStore {
    /// Creates a new empty memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a single blob.
    #[must_use]
    pub fn with_blob(name: &str, bytes: Vec<u8>) -> Self {
        let store = Self::new();
        store
            .blobs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.to_string(), bytes);
        store
    }

    /// Returns the number of successful writes since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns a list of all blob names.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying lock is poisoned.
    pub fn list(&self) -> StorageResult<Vec<String>> {
        Ok(self.read_guard()?.keys().cloned().collect())
    }

    fn read_guard(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .read()
            .map_err(|_| StorageError::BlobStore("lock poisoned".to_string()))
    }

    fn write_guard(
        &self,
    ) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .write()
            .map_err(|_| StorageError::BlobStore("lock poisoned".to_string()))
    }
}

impl AtomicBlobStore for MemoryBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.read_guard()?.get(name).cloned())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        self.write_guard()?.insert(name.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.write_guard()?.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.read_guard()?.contains_key(name))
    }
}
