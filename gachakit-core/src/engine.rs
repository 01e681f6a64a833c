//! The cryptographic engine capability and its single-flight loader.
//!
//! The engine (key handling, proving, verifying) is opaque to this crate. It is
//! produced asynchronously by an [`EngineFactory`] and handed out by an
//! [`EngineLoader`], which makes sure the factory runs at most once at a time
//! and that a successful load is reused forever after.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::error::GachaKitError;
use crate::types::CircuitInputs;

/// Failure reported by the engine. The message is surfaced to users as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Wraps an engine message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the engine's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<EngineError> for GachaKitError {
    fn from(error: EngineError) -> Self {
        Self::Engine(error.message)
    }
}

/// Proving and verification capability for gacha pulls.
#[async_trait]
pub trait GachaEngine: Send + Sync {
    /// Optional startup hook (panic hooks, thread pools, ...). Runs once per load.
    ///
    /// Returns `None` if the engine has no startup hook.
    fn start(&self) -> Option<Result<(), EngineError>> {
        None
    }

    /// Loads the serialized proving key, verifying key and hash parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the inputs cannot be deserialized.
    async fn init_keys(
        &self,
        proving_key: &[u8],
        verifying_key: &[u8],
        params: &[u8],
    ) -> Result<(), EngineError>;

    /// Produces a serialized proof for `inputs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys are not initialized or proving fails.
    async fn generate_proof(&self, inputs: &CircuitInputs) -> Result<Vec<u8>, EngineError>;

    /// Checks `proof` against the public `merkle_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof or root cannot be decoded. A well-formed
    /// but wrong proof is `Ok(false)`.
    async fn verify_proof(&self, merkle_root: &str, proof: &[u8]) -> Result<bool, EngineError>;
}

/// Shared handle to a loaded engine.
pub type EngineHandle = Arc<dyn GachaEngine>;

/// Asynchronously produces an engine, e.g. by loading a compiled module.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Loads a fresh engine.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::EngineLoad`] if the engine cannot be loaded.
    async fn load(&self) -> Result<EngineHandle, GachaKitError>;
}

type LoadFuture = Shared<BoxFuture<'static, Result<EngineHandle, GachaKitError>>>;

enum LoaderState {
    Idle,
    Loading(LoadFuture),
    Ready(EngineHandle),
}

/// Single-flight, memoizing loader for the engine.
///
/// Concurrent [`EngineLoader::acquire`] calls made before the first load settles
/// all await the same load. A successful load is cached; a failed one is not, so
/// the next call starts over.
pub struct EngineLoader {
    factory: Arc<dyn EngineFactory>,
    state: Mutex<LoaderState>,
}

impl fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lock() {
            LoaderState::Idle => "idle",
            LoaderState::Loading(_) => "loading",
            LoaderState::Ready(_) => "ready",
        };
        f.debug_struct("EngineLoader")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl EngineLoader {
    /// Creates a loader over `factory`. Nothing is loaded until the first `acquire`.
    #[must_use]
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(LoaderState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        // the state is a plain tag, a panic elsewhere cannot leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the engine, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns the load error. Every caller waiting on the same load receives it.
    pub async fn acquire(&self) -> Result<EngineHandle, GachaKitError> {
        let pending = {
            let mut state = self.lock();
            match &*state {
                LoaderState::Ready(engine) => return Ok(Arc::clone(engine)),
                LoaderState::Loading(pending) => pending.clone(),
                LoaderState::Idle => {
                    let pending = self.start_load();
                    *state = LoaderState::Loading(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.lock();
        if let LoaderState::Loading(current) = &*state {
            if current.ptr_eq(&pending) {
                *state = match &result {
                    Ok(engine) => LoaderState::Ready(Arc::clone(engine)),
                    Err(_) => LoaderState::Idle,
                };
            }
        }
        result
    }

    fn start_load(&self) -> LoadFuture {
        let factory = Arc::clone(&self.factory);
        async move {
            tracing::debug!("loading engine module");
            let engine = match factory.load().await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!("failed to load engine module: {err}");
                    return Err(err);
                }
            };
            match engine.start() {
                Some(Ok(())) => tracing::debug!("engine startup hook ran"),
                Some(Err(err)) => tracing::warn!("engine startup hook failed: {err}"),
                None => tracing::warn!("engine module has no startup hook"),
            }
            tracing::info!("engine module loaded");
            Ok(engine)
        }
        .boxed()
        .shared()
    }

    /// Returns the engine if a load already succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`GachaKitError::EngineNotLoaded`] instead of triggering a load.
    pub fn peek(&self) -> Result<EngineHandle, GachaKitError> {
        match &*self.lock() {
            LoaderState::Ready(engine) => Ok(Arc::clone(engine)),
            LoaderState::Idle | LoaderState::Loading(_) => Err(GachaKitError::EngineNotLoaded),
        }
    }

    /// Returns `true` if a load already succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.lock(), LoaderState::Ready(_))
    }

    /// Drops the cached engine so the next `acquire` loads a fresh one.
    ///
    /// A load already in flight is left alone; its waiters still get its result.
    pub fn reset(&self) {
        let mut state = self.lock();
        if matches!(&*state, LoaderState::Ready(_)) {
            *state = LoaderState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Semaphore;

    use super::*;

    struct NullEngine {
        hook: Option<Result<(), EngineError>>,
        hook_calls: AtomicUsize,
    }

    #[async_trait]
    impl GachaEngine for NullEngine {
        fn start(&self) -> Option<Result<(), EngineError>> {
            self.hook_calls.fetch_add(1, Ordering::SeqCst);
            self.hook.clone()
        }

        async fn init_keys(&self, _: &[u8], _: &[u8], _: &[u8]) -> Result<(), EngineError> {
            Ok(())
        }

        async fn generate_proof(&self, _: &CircuitInputs) -> Result<Vec<u8>, EngineError> {
            Ok(vec![])
        }

        async fn verify_proof(&self, _: &str, _: &[u8]) -> Result<bool, EngineError> {
            Ok(true)
        }
    }

    /// Factory whose loads wait on a gate and fail while `failures` is positive.
    struct GatedFactory {
        gate: Semaphore,
        loads: AtomicUsize,
        failures: AtomicUsize,
        engine: Arc<NullEngine>,
    }

    impl GatedFactory {
        fn new(failures: usize, hook: Option<Result<(), EngineError>>) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                loads: AtomicUsize::new(0),
                failures: AtomicUsize::new(failures),
                engine: Arc::new(NullEngine {
                    hook,
                    hook_calls: AtomicUsize::new(0),
                }),
            })
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    #[async_trait]
    impl EngineFactory for GatedFactory {
        async fn load(&self) -> Result<EngineHandle, GachaKitError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await.expect("gate closed");
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(GachaKitError::EngineLoad("WASM load failed".to_string()));
            }
            let engine: EngineHandle = self.engine.clone();
            Ok(engine)
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquire_is_single_flight() {
        let factory = GatedFactory::new(0, Some(Ok(())));
        let loader = Arc::new(EngineLoader::new(factory.clone()));

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move { loader.acquire().await })
            })
            .collect();
        while factory.loads.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(matches!(loader.peek(), Err(GachaKitError::EngineNotLoaded)));
        factory.open();

        let mut engines = Vec::new();
        for waiter in waiters {
            engines.push(waiter.await.unwrap().expect("load"));
        }
        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
        assert_eq!(factory.engine.hook_calls.load(Ordering::SeqCst), 1);
        for engine in &engines {
            assert!(Arc::ptr_eq(engine, &engines[0]));
        }

        // later calls hit the cache
        let again = loader.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&again, &engines[0]));
        assert!(Arc::ptr_eq(&loader.peek().unwrap(), &engines[0]));
        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_memoized() {
        let factory = GatedFactory::new(1, None);
        factory.open();
        let loader = EngineLoader::new(factory.clone());

        let err = loader.acquire().await.err().expect("first load fails");
        assert_eq!(err.to_string(), "WASM load failed");
        assert!(!loader.is_loaded());

        loader.acquire().await.expect("second load succeeds");
        assert!(loader.is_loaded());
        assert_eq!(factory.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_a_failure() {
        let factory = GatedFactory::new(1, None);
        let loader = Arc::new(EngineLoader::new(factory.clone()));

        let first = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.acquire().await }
        });
        let second = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.acquire().await }
        });
        while factory.loads.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        // let both waiters subscribe to the pending load
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        factory.open();

        assert!(first.await.unwrap().is_err());
        assert!(second.await.unwrap().is_err());
        assert_eq!(factory.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_startup_hook_is_not_fatal() {
        let factory = GatedFactory::new(0, Some(Err(EngineError::new("no panic hook"))));
        factory.open();
        let loader = EngineLoader::new(factory.clone());
        assert!(loader.acquire().await.is_ok());
        assert_eq!(factory.engine.hook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_a_fresh_load() {
        let factory = GatedFactory::new(0, None);
        factory.open();
        let loader = EngineLoader::new(factory.clone());
        loader.acquire().await.unwrap();
        loader.reset();
        assert!(matches!(loader.peek(), Err(GachaKitError::EngineNotLoaded)));
        loader.acquire().await.unwrap();
        assert_eq!(factory.loads.load(Ordering::SeqCst), 2);
    }
}
