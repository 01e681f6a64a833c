//! The gacha store: one explicitly owned context holding the workflow state.
//!
//! Every phase (load, pull, prove, verify) is an `async` method on
//! [`GachaStore`]. Guards are checked and the phase tag is set in a single
//! synchronous merge before the first suspension point, so two phases can
//! never run at once, whether the calls come from one task or many. A call
//! made while another phase runs is a silent no-op ([`PhaseOutcome::Skipped`]).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;

use crate::config::GachaConfig;
use crate::engine::{EngineFactory, EngineLoader};
use crate::error::{GachaKitError, PhaseOutcome};
use crate::state::GachaState;
use crate::storage::{AtomicBlobStore, DurableStore, PersistedState};
use crate::transport::{AssetTransport, HttpTransport};
use crate::types::{Phase, VerificationOutcome};

mod init;
mod proof;
mod pull;


/// Builder for [`GachaStore`].
pub struct GachaStoreBuilder {
    config: GachaConfig,
    engine_factory: Arc<dyn EngineFactory>,
    transport: Option<Arc<dyn AssetTransport>>,
    blob_store: Option<Arc<dyn AtomicBlobStore>>,
    seed: Option<u64>,
}

impl GachaStoreBuilder {
    /// Uses `transport` instead of an [`HttpTransport`] built from the config.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn AssetTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persists the inventory to `blob_store`. Without one, nothing outlives the store.
    #[must_use]
    pub fn blob_store(mut self, blob_store: Arc<dyn AtomicBlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    /// Seeds the random locator selection, for reproducible sessions.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the store, hydrating the inventory from durable storage.
    ///
    /// A missing, unreadable or incompatible persisted inventory is logged and
    /// replaced by an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::InvalidConfig`] if the configuration is not usable.
    pub fn build(self) -> Result<GachaStore, GachaKitError> {
        self.config.validate()?;

        let durable = self
            .blob_store
            .map(|blob_store| DurableStore::new(blob_store, self.config.storage_name.clone()));
        let state = durable.as_ref().map_or_else(GachaState::default, hydrate);

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&self.config)));
        let rng = self
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (watch, _) = watch::channel(state.clone());

        Ok(GachaStore {
            config: self.config,
            transport,
            loader: EngineLoader::new(self.engine_factory),
            state: Mutex::new(state),
            watch,
            durable,
            rng: Mutex::new(rng),
        })
    }
}

fn hydrate(durable: &DurableStore) -> GachaState {
    match durable.load() {
        Ok(Some(persisted)) => {
            tracing::debug!(
                items = persisted.inventory.len(),
                "hydrated inventory from {}",
                durable.name()
            );
            persisted.hydrate(GachaState::default())
        }
        Ok(None) => GachaState::default(),
        Err(err) => {
            tracing::warn!("ignoring persisted state in {}: {err}", durable.name());
            GachaState::default()
        }
    }
}

/// Orchestrates engine loading, asset initialization and the pull, prove and
/// verify phases, and owns the resulting state.
pub struct GachaStore {
    config: GachaConfig,
    transport: Arc<dyn AssetTransport>,
    loader: EngineLoader,
    state: Mutex<GachaState>,
    watch: watch::Sender<GachaState>,
    durable: Option<DurableStore>,
    rng: Mutex<StdRng>,
}

impl fmt::Debug for GachaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GachaStore")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}

impl GachaStore {
    /// Starts building a store for `config`, loading its engine from `engine_factory`.
    #[must_use]
    pub fn builder(
        config: GachaConfig,
        engine_factory: Arc<dyn EngineFactory>,
    ) -> GachaStoreBuilder {
        GachaStoreBuilder {
            config,
            engine_factory,
            transport: None,
            blob_store: None,
            seed: None,
        }
    }

    /// Returns the store's configuration.
    #[must_use]
    pub const fn config(&self) -> &GachaConfig {
        &self.config
    }

    /// Returns the engine loader.
    #[must_use]
    pub const fn engine_loader(&self) -> &EngineLoader {
        &self.loader
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> GachaState {
        self.lock().clone()
    }

    /// Reads the current state without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&GachaState) -> R) -> R {
        f(&self.lock())
    }

    /// Subscribes to state changes. The receiver sees every committed merge.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GachaState> {
        self.watch.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, GachaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` to the state as one atomic step, persists the durable
    /// subset if it changed, then publishes the result to subscribers.
    pub(crate) fn merge<R>(&self, f: impl FnOnce(&mut GachaState) -> R) -> R {
        let mut state = self.lock();
        let inventory_len = state.inventory.len();
        let output = f(&mut state);
        if state.inventory.len() != inventory_len {
            self.persist(&state);
        }
        self.watch.send_if_modified(|published| {
            if *published == *state {
                false
            } else {
                published.clone_from(&state);
                true
            }
        });
        output
    }

    fn persist(&self, state: &GachaState) {
        let Some(durable) = &self.durable else {
            return;
        };
        if let Err(err) = durable.save(&PersistedState::from_state(state)) {
            tracing::warn!("failed to persist inventory to {}: {err}", durable.name());
        }
    }

    /// Picks a locator index uniformly at random. Repeats across pulls are allowed.
    pub(crate) fn pick_index(&self, len: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..len)
    }

    /// Clears the pull, proof and verification state.
    ///
    /// Inventory, root and initialization flags are untouched. An in-flight
    /// pull, proof or verification is not cancelled, but its result will be
    /// dropped when it completes. Calling this twice is the same as calling it once.
    pub fn reset_pull_state(&self) {
        tracing::debug!("resetting pull state");
        self.merge(|state| {
            let in_flight = state.phase.is_pull_cycle();
            if in_flight {
                state.phase = Phase::Idle;
            }
            if in_flight
                || state.pull_result.is_some()
                || state.pull_error.is_some()
                || state.proof.is_some()
                || state.proof_generation_error.is_some()
                || state.verification_result != VerificationOutcome::Unknown
                || state.verification_error.is_some()
            {
                state.pull_cycle += 1;
            }
            state.clear_pull_cycle();
        });
    }

    /// Tears the initialized session down so the next load starts from scratch.
    ///
    /// Clears the initialization latches, root, locators and item master, the
    /// pull cycle, and drops the cached engine. Inventory is kept. Skipped while
    /// any phase is running.
    pub fn teardown(&self) -> PhaseOutcome {
        let torn_down = self.merge(|state| {
            if state.phase != Phase::Idle {
                return false;
            }
            let inventory = std::mem::take(&mut state.inventory);
            let pull_cycle = state.pull_cycle + 1;
            *state = GachaState {
                inventory,
                pull_cycle,
                ..GachaState::default()
            };
            true
        });
        if !torn_down {
            tracing::debug!("teardown skipped, a phase is running");
            return PhaseOutcome::Skipped;
        }
        self.loader.reset();
        tracing::info!("gacha session torn down");
        PhaseOutcome::Completed
    }
}
