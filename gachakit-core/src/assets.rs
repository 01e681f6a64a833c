//! Fetching and parsing the static resources needed before the first pull.

use strum::{AsRefStr, Display};

use crate::config::AssetPaths;
use crate::error::GachaKitError;
use crate::transport::{decode_json, decode_text, AssetTransport};
use crate::types::ItemMaster;

/// The six resources fetched during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum InitialAsset {
    /// Serialized proving key.
    #[strum(serialize = "pk")]
    ProvingKey,
    /// Serialized verifying key.
    #[strum(serialize = "vk")]
    VerifyingKey,
    /// Serialized hash parameters.
    #[strum(serialize = "params")]
    Params,
    /// Public Merkle root.
    #[strum(serialize = "root")]
    MerkleRoot,
    /// Per-item resource locator list.
    #[strum(serialize = "keyList")]
    KeyList,
    /// Item master table.
    #[strum(serialize = "masterData")]
    ItemMaster,
}

impl InitialAsset {
    /// Returns the configured path of this resource.
    #[must_use]
    pub fn path(self, paths: &AssetPaths) -> &str {
        match self {
            Self::ProvingKey => &paths.proving_key,
            Self::VerifyingKey => &paths.verifying_key,
            Self::Params => &paths.params,
            Self::MerkleRoot => &paths.merkle_root,
            Self::KeyList => &paths.key_list,
            Self::ItemMaster => &paths.item_master,
        }
    }
}

/// Everything initialization fetched, parsed and ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialAssets {
    /// Serialized proving key.
    pub proving_key: Vec<u8>,
    /// Serialized verifying key.
    pub verifying_key: Vec<u8>,
    /// Serialized hash parameters.
    pub params: Vec<u8>,
    /// Public Merkle root, trimmed. `None` if only whitespace was served.
    pub merkle_root: Option<String>,
    /// Per-item resource locators, in list order.
    pub locators: Vec<String>,
    /// Item master table.
    pub item_master: ItemMaster,
}

/// Trims the fetched root value.
///
/// A blank root is not an initialization failure; it is stored as absent and
/// the proof and verification phases report it.
#[must_use]
pub fn parse_merkle_root(text: &str) -> Option<String> {
    let root = text.trim();
    (!root.is_empty()).then(|| root.to_string())
}

/// Splits the locator list into per-item resource paths.
///
/// Lines are trimmed, `prefix` is stripped where present and empty lines are
/// dropped. Order is preserved.
#[must_use]
pub fn parse_locators(text: &str, prefix: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .map(|line| {
            if prefix.is_empty() {
                line
            } else {
                line.strip_prefix(prefix).unwrap_or(line)
            }
        })
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Fetches all six initialization resources concurrently and parses them.
///
/// # Errors
///
/// Returns [`GachaKitError::AssetFetch`] naming every resource that failed to
/// fetch, or [`GachaKitError::InvalidData`] if a text resource is not UTF-8 or
/// the item master is malformed.
pub async fn fetch_initial_assets(
    transport: &dyn AssetTransport,
    paths: &AssetPaths,
    locator_prefix: &str,
) -> Result<InitialAssets, GachaKitError> {
    let fetch = |asset: InitialAsset| async move {
        let result = transport.fetch(asset.path(paths)).await;
        if let Err(err) = &result {
            tracing::warn!(resource = %asset, "fetch failed: {err}");
        }
        (asset, result)
    };

    let (pk, vk, params, root, key_list, item_master) = tokio::join!(
        fetch(InitialAsset::ProvingKey),
        fetch(InitialAsset::VerifyingKey),
        fetch(InitialAsset::Params),
        fetch(InitialAsset::MerkleRoot),
        fetch(InitialAsset::KeyList),
        fetch(InitialAsset::ItemMaster),
    );

    let mut failed = Vec::new();
    let mut body = |(asset, result): (InitialAsset, Result<Vec<u8>, GachaKitError>)| {
        result.map_err(|_| failed.push(asset.to_string())).ok()
    };
    let bodies = (
        body(pk),
        body(vk),
        body(params),
        body(root),
        body(key_list),
        body(item_master),
    );
    let (
        Some(proving_key),
        Some(verifying_key),
        Some(params),
        Some(root),
        Some(key_list),
        Some(item_master),
    ) = bodies
    else {
        return Err(GachaKitError::AssetFetch { resources: failed });
    };

    let merkle_root = parse_merkle_root(&decode_text(InitialAsset::MerkleRoot.as_ref(), root)?);
    let key_list = decode_text(InitialAsset::KeyList.as_ref(), key_list)?;
    let locators = parse_locators(&key_list, locator_prefix);
    let item_master: ItemMaster = decode_json(InitialAsset::ItemMaster.as_ref(), &item_master)?;

    Ok(InitialAssets {
        proving_key,
        verifying_key,
        params,
        merkle_root,
        locators,
        item_master,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use test_case::test_case;

    use super::*;

    struct MapTransport(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl AssetTransport for MapTransport {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, GachaKitError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| GachaKitError::NetworkError {
                    url: path.to_string(),
                    status: Some(404),
                    error: "Fetch failed: 404".to_string(),
                })
        }
    }

    fn full_assets() -> HashMap<String, Vec<u8>> {
        let paths = AssetPaths::default();
        HashMap::from([
            (paths.proving_key, vec![1, 2, 3]),
            (paths.verifying_key, vec![4, 5, 6]),
            (paths.params, vec![7, 8, 9]),
            (paths.merkle_root, b"  deadbeef\n".to_vec()),
            (
                paths.key_list,
                b"apps/web/public/gacha/items/item_0.json\n\ngacha/items/item_1.json\n".to_vec(),
            ),
            (
                paths.item_master,
                br#"{"0x1234": {"id": "0x1234", "name": "Pikachu", "imageUrl": "/pikachu.png", "rarity": "rare"}}"#
                    .to_vec(),
            ),
        ])
    }

    #[test_case("gacha/items/item_0.json\ngacha/items/item_1.json", &["gacha/items/item_0.json", "gacha/items/item_1.json"] ; "plain list")]
    #[test_case("apps/web/public/gacha/a.json\r\n  apps/web/public/gacha/b.json  ", &["gacha/a.json", "gacha/b.json"] ; "prefixed with crlf and padding")]
    #[test_case("\n\n  \n", &[] ; "only blank lines")]
    #[test_case("gacha/apps/web/public/x.json", &["gacha/apps/web/public/x.json"] ; "prefix only stripped at start")]
    fn test_parse_locators(text: &str, expected: &[&str]) {
        assert_eq!(parse_locators(text, "apps/web/public/"), expected);
    }

    #[test]
    fn test_parse_merkle_root() {
        assert_eq!(parse_merkle_root(" deadbeef \n").as_deref(), Some("deadbeef"));
        assert_eq!(parse_merkle_root("  \n"), None);
        assert_eq!(parse_merkle_root(""), None);
    }

    #[tokio::test]
    async fn test_fetch_initial_assets() {
        let transport = MapTransport(full_assets());
        let assets = fetch_initial_assets(&transport, &AssetPaths::default(), "apps/web/public/")
            .await
            .unwrap();
        assert_eq!(assets.proving_key, vec![1, 2, 3]);
        assert_eq!(assets.merkle_root.as_deref(), Some("deadbeef"));
        assert_eq!(
            assets.locators,
            vec!["gacha/items/item_0.json", "gacha/items/item_1.json"]
        );
        assert_eq!(assets.item_master["0x1234"].name, "Pikachu");
    }

    #[tokio::test]
    async fn test_fetch_initial_assets_names_every_failure() {
        let paths = AssetPaths::default();
        let mut resources = full_assets();
        resources.remove(&paths.proving_key);
        resources.remove(&paths.item_master);

        let err = fetch_initial_assets(&MapTransport(resources), &paths, "")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GachaKitError::AssetFetch {
                resources: vec!["pk".to_string(), "masterData".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_item_master_is_a_validation_error() {
        let paths = AssetPaths::default();
        let mut resources = full_assets();
        resources.insert(paths.item_master.clone(), b"[1, 2]".to_vec());

        let err = fetch_initial_assets(&MapTransport(resources), &paths, "")
            .await
            .unwrap_err();
        assert!(matches!(err, GachaKitError::InvalidData { resource, .. } if resource == "masterData"));
    }

    #[tokio::test]
    async fn test_blank_merkle_root_is_not_a_failure() {
        let paths = AssetPaths::default();
        let mut resources = full_assets();
        resources.insert(paths.merkle_root.clone(), b"  \n".to_vec());

        let assets = fetch_initial_assets(&MapTransport(resources), &paths, "")
            .await
            .unwrap();
        assert_eq!(assets.merkle_root, None);
        assert_eq!(assets.locators.len(), 2);
    }
}
