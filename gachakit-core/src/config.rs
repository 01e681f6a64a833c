//! Store configuration: where the static resources live and how they are fetched.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GachaKitError;

/// Default prefix the locator list generator leaves in front of every path.
pub const DEFAULT_LOCATOR_PREFIX: &str = "apps/web/public/";
/// Default name of the durable storage entry.
pub const DEFAULT_STORAGE_NAME: &str = "gacha-game-storage";
/// Default image for items missing from the item master.
pub const DEFAULT_PLACEHOLDER_IMAGE_URL: &str = "/placeholder.png";

/// Paths of the static resources fetched during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Serialized proving key.
    pub proving_key: String,
    /// Serialized verifying key.
    pub verifying_key: String,
    /// Serialized hash parameters.
    pub params: String,
    /// Public Merkle root (hex text).
    pub merkle_root: String,
    /// Newline separated list of per-item resource paths.
    pub key_list: String,
    /// JSON item master table.
    pub item_master: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            proving_key: "/gacha/gacha_pk.bin".to_string(),
            verifying_key: "/gacha/gacha_vk.bin".to_string(),
            params: "/gacha/params.bin".to_string(),
            merkle_root: "/gacha/merkle_root.hex".to_string(),
            key_list: "/gacha/items/key_list.txt".to_string(),
            item_master: "/gacha/item_master.json".to_string(),
        }
    }
}

/// Configuration of a [`crate::GachaStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GachaConfig {
    /// Origin the static resources are served from, e.g. `https://gacha.example`.
    pub base_url: String,
    /// Static resource paths.
    pub assets: AssetPaths,
    /// Prefix stripped from every entry of the locator list.
    pub locator_prefix: String,
    /// Name of the durable storage entry holding the inventory.
    pub storage_name: String,
    /// Image used for placeholder items.
    pub placeholder_image_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Retries for transient fetch failures (total attempts = retries + 1).
    pub max_retries: u32,
}

impl Default for GachaConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            assets: AssetPaths::default(),
            locator_prefix: DEFAULT_LOCATOR_PREFIX.to_string(),
            storage_name: DEFAULT_STORAGE_NAME.to_string(),
            placeholder_image_url: DEFAULT_PLACEHOLDER_IMAGE_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl GachaConfig {
    /// Builds a default configuration serving resources from `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::InvalidConfig`] if the JSON is malformed or the
    /// resulting configuration is not usable.
    pub fn from_json(json: &str) -> Result<Self, GachaKitError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GachaKitError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values no store can work with.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), GachaKitError> {
        if self.storage_name.trim().is_empty() {
            return Err(GachaKitError::InvalidConfig(
                "storage_name must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(GachaKitError::InvalidConfig(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
