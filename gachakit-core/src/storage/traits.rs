//! Platform interface for durable storage.

use super::error::StorageResult;

/// Atomic storage for small named blobs.
///
/// Writes MUST be atomic: after a crash the blob holds either the complete old
/// content or the complete new content, never a partial write. File-backed
/// implementations get there with write-to-temp, `fsync`, then rename.
pub trait AtomicBlobStore: Send + Sync {
    /// Reads a blob by name.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails (e.g., I/O error, permission denied).
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically writes a blob, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Deletes a blob. Deleting a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for actual I/O failures.
    fn delete(&self, name: &str) -> StorageResult<()>;

    /// Checks if a blob exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.read(name)?.is_some())
    }
}
