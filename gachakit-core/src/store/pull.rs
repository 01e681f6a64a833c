use super::GachaStore;
use crate::error::{GachaKitError, PhaseError, PhaseOutcome};
use crate::types::{ItemDetails, ItemMaster, Phase, PullInputBundle, PullResult};

enum PullStart {
    Skipped,
    Rejected(PhaseError),
    Started { cycle: u64, locator: String },
}

impl GachaStore {
    /// Pulls a random item: picks a locator, fetches its proof inputs, resolves
    /// the display metadata and appends it to the inventory.
    ///
    /// Skipped unless the keys are initialized and no other phase runs. Any
    /// proof or verification from the previous pull is cleared before the fetch.
    pub async fn perform_pull(&self) -> PhaseOutcome {
        let start = self.merge(|state| {
            if state.phase != Phase::Idle || !state.keys_initialized {
                return PullStart::Skipped;
            }
            state.pull_cycle += 1;
            state.clear_pull_cycle();
            if state.available_key_urls.is_empty() || state.item_master.is_none() {
                let error = PhaseError::from(&GachaKitError::MissingPrerequisite(
                    "Assets not loaded or no keys available.".to_string(),
                ));
                state.pull_error = Some(error.clone());
                return PullStart::Rejected(error);
            }
            let index = self.pick_index(state.available_key_urls.len());
            state.phase = Phase::Pulling;
            PullStart::Started {
                cycle: state.pull_cycle,
                locator: state.available_key_urls[index].clone(),
            }
        });
        let (cycle, locator) = match start {
            PullStart::Skipped => {
                tracing::debug!("perform_pull skipped");
                return PhaseOutcome::Skipped;
            }
            PullStart::Rejected(error) => {
                tracing::error!("cannot pull: {error}");
                return PhaseOutcome::Failed(error);
            }
            PullStart::Started { cycle, locator } => (cycle, locator),
        };

        tracing::debug!(%locator, "pulling item");
        let fetched = self.fetch_bundle(&locator).await;

        self.merge(|state| {
            if state.pull_cycle != cycle {
                tracing::debug!(%locator, "pull superseded, dropping its result");
                return PhaseOutcome::Superseded;
            }
            state.phase = Phase::Idle;
            match fetched {
                Ok(bundle) => {
                    let item_details = self.resolve_details(state.item_master.as_ref(), &bundle);
                    state.inventory.push(item_details.clone());
                    tracing::info!(item = %item_details.name, "pulled item");
                    state.pull_result = Some(PullResult {
                        bundle,
                        item_details,
                    });
                    PhaseOutcome::Completed
                }
                Err(err) => {
                    tracing::error!(%locator, "pull failed: {err}");
                    let error = PhaseError::from(&err);
                    state.pull_error = Some(error.clone());
                    PhaseOutcome::Failed(error)
                }
            }
        })
    }

    async fn fetch_bundle(&self, locator: &str) -> Result<PullInputBundle, GachaKitError> {
        let path = format!("/{}", locator.trim_start_matches('/'));
        let bytes = self.transport.fetch(&path).await?;
        PullInputBundle::decode(&bytes, &path)
    }

    fn resolve_details(
        &self,
        item_master: Option<&ItemMaster>,
        bundle: &PullInputBundle,
    ) -> ItemDetails {
        if let Some(details) = item_master.and_then(|master| master.get(&bundle.item_id_hex)) {
            return details.clone();
        }
        tracing::warn!(
            item_id = %bundle.item_id_hex,
            "item missing from the item master, using a placeholder"
        );
        ItemDetails::placeholder(&bundle.item_id_hex, &self.config.placeholder_image_url)
    }
}
