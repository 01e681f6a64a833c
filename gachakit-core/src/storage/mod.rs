//! Durable storage for the part of the gacha state that outlives a session.

pub mod error;
pub mod file;
pub mod memory;
pub mod persist;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;
pub use persist::{DurableStore, PersistedState};
pub use traits::AtomicBlobStore;
