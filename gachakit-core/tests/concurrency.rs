//! Phase exclusion when the store is shared between tasks on a multi-threaded runtime.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use gachakit_core::{
    AssetPaths, AssetTransport, GachaConfig, GachaKitError, GachaStore, PhaseOutcome,
};

struct StaticTransport;

#[async_trait]
impl AssetTransport for StaticTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, GachaKitError> {
        let paths = AssetPaths::default();
        tokio::task::yield_now().await;
        let body = match path {
            p if p == paths.merkle_root => common::MERKLE_ROOT.to_string(),
            p if p == paths.key_list => common::KEY_LIST.to_string(),
            p if p == paths.item_master => common::ITEM_MASTER.to_string(),
            "/gacha/items/item_0.json" => common::bundle("0x1234", 0),
            "/gacha/items/item_1.json" => common::bundle("0x5678", 1),
            _ => "opaque".to_string(),
        };
        Ok(body.into_bytes())
    }
}

fn store(factory: Arc<common::MockFactory>) -> Arc<GachaStore> {
    let store = GachaStore::builder(GachaConfig::new("https://gacha.example"), factory)
        .transport(Arc::new(StaticTransport))
        .build()
        .unwrap();
    Arc::new(store)
}

async fn run_concurrently<F, Fut>(store: &Arc<GachaStore>, n: usize, op: F) -> Vec<PhaseOutcome>
where
    F: Fn(Arc<GachaStore>) -> Fut,
    Fut: std::future::Future<Output = PhaseOutcome> + Send + 'static,
{
    let handles: Vec<_> = (0..n)
        .map(|_| tokio::spawn(op(Arc::clone(store))))
        .collect();
    let mut outcomes = Vec::with_capacity(n);
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_run_once() {
    let factory = common::MockFactory::new();
    let store = store(factory.clone());

    let outcomes = run_concurrently(&store, 8, |store| async move {
        store.load_initial_assets().await
    })
    .await;

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    assert_eq!(completed, 1);
    assert!(outcomes.iter().all(|o| o.is_completed() || o.is_skipped()));
    assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
    assert!(store.snapshot().is_keys_initialized());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pulls_never_overlap() {
    let store = store(common::MockFactory::new());
    store.load_initial_assets().await;

    let mut completed = 0;
    for _ in 0..5 {
        let outcomes =
            run_concurrently(&store, 6, |store| async move { store.perform_pull().await }).await;
        assert!(outcomes.iter().all(|o| o.is_completed() || o.is_skipped()));
        completed += outcomes.iter().filter(|o| o.is_completed()).count();

        let state = store.snapshot();
        assert!(!state.is_pulling());
        assert_eq!(state.inventory().len(), completed);
    }
    assert!(completed >= 5);
}
