//! Projection of the gacha state onto its durable subset.
//!
//! Only the inventory is persisted. Everything else is rebuilt fresh in every
//! session, so the projection and its inverse are the only places that know
//! which fields survive a restart.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use super::traits::AtomicBlobStore;
use crate::state::GachaState;
use crate::types::ItemDetails;

const STORAGE_VERSION: u32 = 0;

/// The durable subset of [`GachaState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Every item pulled so far, oldest first.
    pub inventory: Vec<ItemDetails>,
}

impl PersistedState {
    /// Projects the durable subset out of the full state.
    #[must_use]
    pub fn from_state(state: &GachaState) -> Self {
        Self {
            inventory: state.inventory().to_vec(),
        }
    }

    /// Merges the durable subset into `state`, leaving every other field as is.
    #[must_use]
    pub fn hydrate(self, mut state: GachaState) -> GachaState {
        state.inventory = self.inventory;
        state
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    state: PersistedState,
    version: u32,
}

/// Reads and writes [`PersistedState`] under a fixed storage name.
#[derive(Clone)]
pub struct DurableStore {
    blob_store: Arc<dyn AtomicBlobStore>,
    name: String,
}

impl fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DurableStore {
    /// Creates a durable store writing to the blob `name`.
    #[must_use]
    pub fn new(blob_store: Arc<dyn AtomicBlobStore>, name: impl Into<String>) -> Self {
        Self {
            blob_store,
            name: name.into(),
        }
    }

    /// Returns the storage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the persisted subset, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be read, is not a valid envelope,
    /// or was written by an unsupported version.
    pub fn load(&self) -> StorageResult<Option<PersistedState>> {
        let Some(bytes) = self.blob_store.read(&self.name)? else {
            return Ok(None);
        };
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        if envelope.version != STORAGE_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        Ok(Some(envelope.state))
    }

    /// Atomically replaces the persisted subset.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, state: &PersistedState) -> StorageResult<()> {
        let envelope = Envelope {
            state: state.clone(),
            version: STORAGE_VERSION,
        };
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.blob_store.write_atomic(&self.name, &bytes)
    }
}
