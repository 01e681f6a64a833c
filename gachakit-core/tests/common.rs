//! Common test utilities shared across integration tests.
#![allow(dead_code, missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gachakit_core::{
    CircuitInputs, EngineError, EngineFactory, EngineHandle, GachaEngine, GachaKitError,
};

pub const MERKLE_ROOT: &str = "deadbeef";

pub const KEY_LIST: &str = "apps/web/public/gacha/items/item_0.json\n\
                            apps/web/public/gacha/items/item_1.json\n";

pub const ITEM_MASTER: &str = r#"{
    "0x1234": {"id": "0x1234", "name": "Pikachu", "imageUrl": "/items/pikachu.png", "rarity": "rare"},
    "0x5678": {"id": "0x5678", "name": "Eevee", "imageUrl": "/items/eevee.png"}
}"#;

pub fn bundle(item_id_hex: &str, leaf_index: u64) -> String {
    serde_json::json!({
        "itemIdHex": item_id_hex,
        "secretKeyHex": format!("0x{leaf_index:04x}"),
        "merklePathNodesHex": ["0xaa", "0xbb"],
        "leafSiblingHashHex": "0xcc",
        "leafIndex": leaf_index,
    })
    .to_string()
}

/// Engine double accepting every key and proving with a fixed byte string.
#[derive(Default)]
pub struct MockEngine {
    pub proofs: Mutex<Vec<CircuitInputs>>,
    pub verifications: AtomicUsize,
}

#[async_trait]
impl GachaEngine for MockEngine {
    fn start(&self) -> Option<Result<(), EngineError>> {
        Some(Ok(()))
    }

    async fn init_keys(&self, _: &[u8], _: &[u8], _: &[u8]) -> Result<(), EngineError> {
        Ok(())
    }

    async fn generate_proof(&self, inputs: &CircuitInputs) -> Result<Vec<u8>, EngineError> {
        self.proofs.lock().unwrap().push(inputs.clone());
        Ok(format!("proof:{}", inputs.item_id_hex).into_bytes())
    }

    async fn verify_proof(&self, merkle_root: &str, proof: &[u8]) -> Result<bool, EngineError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        Ok(merkle_root == MERKLE_ROOT && proof.starts_with(b"proof:"))
    }
}

pub struct MockFactory {
    pub engine: Arc<MockEngine>,
    pub loads: AtomicUsize,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(MockEngine::default()),
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EngineFactory for MockFactory {
    async fn load(&self) -> Result<EngineHandle, GachaKitError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let engine: EngineHandle = self.engine.clone();
        Ok(engine)
    }
}

/// Routes tracing output to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
