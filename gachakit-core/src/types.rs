//! Value types shared by the workflows, the engine capability and storage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::GachaKitError;

/// Display metadata for a pullable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    /// Item identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image shown for the item.
    pub image_url: String,
    /// Rarity tier, when the item master declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
}

impl ItemDetails {
    /// Builds the stand-in shown when the item master has no entry for `item_id_hex`.
    ///
    /// The id and name are derived from characters 2..8 of the identifier,
    /// i.e. the first six hex digits after a `0x` prefix.
    #[must_use]
    pub fn placeholder(item_id_hex: &str, image_url: &str) -> Self {
        let fragment: String = item_id_hex.chars().skip(2).take(6).collect();
        Self {
            id: format!("unknown-{fragment}"),
            name: format!("Mystery Item #{fragment}"),
            image_url: image_url.to_string(),
            rarity: Some("unknown".to_string()),
        }
    }
}

/// Item master lookup table, keyed by item identifier.
pub type ItemMaster = HashMap<String, ItemDetails>;

/// Proof inputs for one pullable item, as served by its per-item resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullInputBundle {
    /// Item identifier (hex).
    pub item_id_hex: String,
    /// Secret key bound to the leaf (hex).
    pub secret_key_hex: String,
    /// Merkle authentication path, leaf to root.
    pub merkle_path_nodes_hex: Vec<String>,
    /// Hash of the leaf's sibling (hex).
    pub leaf_sibling_hash_hex: String,
    /// Index of the leaf in the tree.
    pub leaf_index: u64,
}

impl PullInputBundle {
    /// Decodes and validates a bundle fetched from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::InvalidData`] if a required field is missing,
    /// the path is not an ordered sequence or the leaf index is not an integer.
    pub fn decode(bytes: &[u8], url: &str) -> Result<Self, GachaKitError> {
        serde_json::from_slice(bytes).map_err(|err| {
            GachaKitError::invalid_data(
                url,
                format!("Invalid item data structure from {url}: {err}"),
            )
        })
    }
}

/// A completed pull: the fetched bundle plus the resolved display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    /// The proof inputs for the pulled item.
    #[serde(flatten)]
    pub bundle: PullInputBundle,
    /// Display metadata (possibly a placeholder).
    pub item_details: ItemDetails,
}

/// The input shape expected by [`crate::GachaEngine::generate_proof`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInputs {
    /// Public Merkle root (hex).
    pub merkle_root: String,
    /// Item identifier (hex).
    pub item_id_hex: String,
    /// Secret key (hex).
    pub secret_key_hex: String,
    /// Merkle authentication path.
    pub merkle_path_nodes_hex: Vec<String>,
    /// Sibling leaf hash (hex).
    pub leaf_sibling_hash_hex: String,
    /// Leaf index.
    pub leaf_index: u64,
}

impl CircuitInputs {
    /// Assembles the inputs for `pull` under the public `merkle_root`.
    #[must_use]
    pub fn new(merkle_root: &str, pull: &PullResult) -> Self {
        let bundle = &pull.bundle;
        Self {
            merkle_root: merkle_root.to_string(),
            item_id_hex: bundle.item_id_hex.clone(),
            secret_key_hex: bundle.secret_key_hex.clone(),
            merkle_path_nodes_hex: bundle.merkle_path_nodes_hex.clone(),
            leaf_sibling_hash_hex: bundle.leaf_sibling_hash_hex.clone(),
            leaf_index: bundle.leaf_index,
        }
    }
}

/// Result of verifying the current proof.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VerificationOutcome {
    /// No verification attempt has completed for the current proof.
    #[default]
    Unknown,
    /// The engine accepted the proof.
    Valid,
    /// The engine rejected the proof.
    Invalid,
}

impl VerificationOutcome {
    /// Returns the outcome as a nullable boolean.
    #[must_use]
    pub const fn as_option(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Valid => Some(true),
            Self::Invalid => Some(false),
        }
    }
}

impl From<bool> for VerificationOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// The phase currently running, if any. At most one phase is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Nothing is running.
    #[default]
    Idle,
    /// Initial assets are being fetched and the engine initialized.
    Loading,
    /// A pull is in flight.
    Pulling,
    /// A proof is being generated.
    Generating,
    /// A proof is being verified.
    Verifying,
}

impl Phase {
    /// Returns `true` for the phases that belong to a pull cycle.
    #[must_use]
    pub const fn is_pull_cycle(self) -> bool {
        matches!(self, Self::Pulling | Self::Generating | Self::Verifying)
    }
}
