#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! `gachakit-core` drives a zero-knowledge gacha session on the client.
//!
//! A [`GachaStore`] loads the cryptographic engine once, fetches the keys and
//! game data, and then runs pulls, proof generation and proof verification one
//! phase at a time. Every phase records its result or its error in the store's
//! [`GachaState`]; the pulled inventory is persisted across restarts.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gachakit_core::storage::FileBlobStore;
//! use gachakit_core::{EngineFactory, GachaConfig, GachaStore};
//!
//! # async fn run(engine: Arc<dyn EngineFactory>) -> Result<(), gachakit_core::GachaKitError> {
//! let store = GachaStore::builder(GachaConfig::new("https://gacha.example"), engine)
//!     .blob_store(Arc::new(FileBlobStore::open("./gacha-data")?))
//!     .build()?;
//!
//! store.load_initial_assets().await;
//! store.perform_pull().await;
//! store.generate_proof_for_last_pull().await;
//! store.verify_proof_for_last_pull().await;
//!
//! let state = store.snapshot();
//! println!("valid: {:?}", state.verification_result().as_option());
//! # Ok(())
//! # }
//! ```

mod assets;
pub use assets::*;

mod config;
pub use config::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod state;
pub use state::*;

mod store;
pub use store::*;

mod transport;
pub use transport::*;

mod types;
pub use types::*;

/// Forwarding of the crate's log lines to a host logger.
pub mod logger;

pub mod storage;

// private modules
mod http_request;
