//! Directory-backed blob store.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::error::{StorageError, StorageResult};
use super::traits::AtomicBlobStore;

const TMP_SUFFIX: &str = ".tmp";

/// Stores each blob as a file under a root directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Opens (creating if needed) a blob store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path backing the blob `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty or would escape the root directory.
    pub fn blob_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
            || name.ends_with(TMP_SUFFIX)
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let tmp_path = PathBuf::from(format!("{}{TMP_SUFFIX}", path.to_string_lossy()));
    if let Err(err) = replace_with_tmp(&tmp_path, path, bytes) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    // persist the rename itself
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

fn replace_with_tmp(tmp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp_path, path)
}

impl AtomicBlobStore for FileBlobStore {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(name)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> StorageResult<()> {
        write_atomic(&self.blob_path(name)?, bytes)
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        match fs::remove_file(self.blob_path(name)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.blob_path(name)?.is_file())
    }
}
