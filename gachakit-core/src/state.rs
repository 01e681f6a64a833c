//! The state observed by consumers of a [`crate::GachaStore`].

use crate::error::PhaseError;
use crate::types::{ItemDetails, ItemMaster, Phase, PullResult, VerificationOutcome};

/// Everything a consumer can read about the gacha workflow.
///
/// Mutation is crate-private and goes through the store's merge primitive; the
/// accessors expose the same fields a UI would bind to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GachaState {
    pub(crate) phase: Phase,

    pub(crate) merkle_root: Option<String>,
    pub(crate) item_master: Option<ItemMaster>,
    pub(crate) available_key_urls: Vec<String>,
    pub(crate) engine_loaded: bool,
    pub(crate) keys_initialized: bool,
    pub(crate) initialization_error: Option<PhaseError>,
    pub(crate) initialization_warning: Option<String>,

    pub(crate) pull_result: Option<PullResult>,
    pub(crate) pull_error: Option<PhaseError>,

    pub(crate) proof: Option<Vec<u8>>,
    pub(crate) proof_generation_error: Option<PhaseError>,

    pub(crate) verification_result: VerificationOutcome,
    pub(crate) verification_error: Option<PhaseError>,

    pub(crate) inventory: Vec<ItemDetails>,

    /// Bumped by every pull and by reset. Completions from an older cycle are dropped.
    pub(crate) pull_cycle: u64,
}

impl GachaState {
    /// The phase currently running.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Public Merkle root, once assets are loaded.
    #[must_use]
    pub fn merkle_root(&self) -> Option<&str> {
        self.merkle_root.as_deref()
    }

    /// Item master table, once assets are loaded.
    #[must_use]
    pub const fn item_master(&self) -> Option<&ItemMaster> {
        self.item_master.as_ref()
    }

    /// Per-item resource locators a pull chooses from.
    #[must_use]
    pub fn available_key_urls(&self) -> &[String] {
        &self.available_key_urls
    }

    /// `true` once the engine module has been loaded.
    #[must_use]
    pub const fn is_wasm_initialized(&self) -> bool {
        self.engine_loaded
    }

    /// `true` once the engine accepted the keys and parameters.
    #[must_use]
    pub const fn is_keys_initialized(&self) -> bool {
        self.keys_initialized
    }

    /// `true` while initialization runs.
    #[must_use]
    pub fn is_loading_assets(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Why the last initialization failed.
    #[must_use]
    pub const fn initialization_error(&self) -> Option<&PhaseError> {
        self.initialization_error.as_ref()
    }

    /// Non-fatal problem noticed during initialization (e.g. an empty locator list).
    #[must_use]
    pub fn initialization_warning(&self) -> Option<&str> {
        self.initialization_warning.as_deref()
    }

    /// `true` while a pull runs.
    #[must_use]
    pub fn is_pulling(&self) -> bool {
        self.phase == Phase::Pulling
    }

    /// The last successful pull of the current cycle.
    #[must_use]
    pub const fn pull_result(&self) -> Option<&PullResult> {
        self.pull_result.as_ref()
    }

    /// Why the last pull failed.
    #[must_use]
    pub const fn pull_error(&self) -> Option<&PhaseError> {
        self.pull_error.as_ref()
    }

    /// `true` while a proof is generated.
    #[must_use]
    pub fn is_generating_proof(&self) -> bool {
        self.phase == Phase::Generating
    }

    /// Proof for the current pull.
    #[must_use]
    pub fn proof(&self) -> Option<&[u8]> {
        self.proof.as_deref()
    }

    /// Why the last proof generation failed.
    #[must_use]
    pub const fn proof_generation_error(&self) -> Option<&PhaseError> {
        self.proof_generation_error.as_ref()
    }

    /// `true` while a proof is verified.
    #[must_use]
    pub fn is_verifying_proof(&self) -> bool {
        self.phase == Phase::Verifying
    }

    /// Outcome of verifying the current proof.
    #[must_use]
    pub const fn verification_result(&self) -> VerificationOutcome {
        self.verification_result
    }

    /// Why the last verification failed.
    #[must_use]
    pub const fn verification_error(&self) -> Option<&PhaseError> {
        self.verification_error.as_ref()
    }

    /// Every item pulled so far, oldest first. Survives restarts.
    #[must_use]
    pub fn inventory(&self) -> &[ItemDetails] {
        &self.inventory
    }

    /// Clears the pull result and everything derived from it.
    pub(crate) fn clear_pull_cycle(&mut self) {
        self.pull_result = None;
        self.pull_error = None;
        self.clear_proof();
    }

    /// Clears the proof and everything derived from it.
    pub(crate) fn clear_proof(&mut self) {
        self.proof = None;
        self.proof_generation_error = None;
        self.clear_verification();
    }

    pub(crate) fn clear_verification(&mut self) {
        self.verification_result = VerificationOutcome::Unknown;
        self.verification_error = None;
    }
}
