use std::sync::Arc;

use super::GachaStore;
use crate::assets::{fetch_initial_assets, InitialAssets};
use crate::error::{GachaKitError, PhaseError, PhaseOutcome};
use crate::types::Phase;

impl GachaStore {
    /// Loads the engine, fetches the initialization resources and hands the keys
    /// to the engine.
    ///
    /// Skipped if another phase runs or the keys are already initialized. On
    /// failure both latches are rolled back and the error is recorded in
    /// [`crate::GachaState::initialization_error`]; calling again retries.
    pub async fn load_initial_assets(&self) -> PhaseOutcome {
        let started = self.merge(|state| {
            if state.phase != Phase::Idle || state.keys_initialized {
                return false;
            }
            state.phase = Phase::Loading;
            state.initialization_error = None;
            state.initialization_warning = None;
            true
        });
        if !started {
            tracing::debug!("load_initial_assets skipped");
            return PhaseOutcome::Skipped;
        }

        match self.initialize().await {
            Ok(assets) => {
                let locators = assets.locators.len();
                if assets.merkle_root.is_none() {
                    tracing::warn!(
                        "merkle root at {} is blank, proofs will fail",
                        self.config.assets.merkle_root
                    );
                }
                self.merge(|state| {
                    state.keys_initialized = true;
                    state.merkle_root = assets.merkle_root;
                    state.available_key_urls = assets.locators;
                    state.item_master = Some(assets.item_master);
                    state.phase = Phase::Idle;
                });
                tracing::info!(locators, "gacha assets initialized");
                PhaseOutcome::Completed
            }
            Err(err) => {
                tracing::error!("failed to initialize gacha assets: {err}");
                let error = PhaseError::from(&err);
                self.merge(|state| {
                    state.keys_initialized = false;
                    state.engine_loaded = false;
                    state.initialization_error = Some(error.clone());
                    state.initialization_warning = None;
                    state.phase = Phase::Idle;
                });
                PhaseOutcome::Failed(error)
            }
        }
    }

    async fn initialize(&self) -> Result<InitialAssets, GachaKitError> {
        let engine = self.loader.acquire().await?;
        self.merge(|state| state.engine_loaded = true);

        let assets = fetch_initial_assets(
            Arc::as_ref(&self.transport),
            &self.config.assets,
            &self.config.locator_prefix,
        )
        .await?;

        if assets.locators.is_empty() {
            tracing::warn!(
                "locator list at {} is empty, pulls will fail",
                self.config.assets.key_list
            );
            self.merge(|state| {
                state.initialization_warning =
                    Some("No item locators were found in the key list.".to_string());
            });
        }

        engine
            .init_keys(&assets.proving_key, &assets.verifying_key, &assets.params)
            .await?;
        Ok(assets)
    }
}
