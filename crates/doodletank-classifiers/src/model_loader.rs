//! Model lifecycle management
//!
//! [`ModelLoader`] hands out a shared [`ModelHandle`], loading it on first use.
//! Concurrent callers coalesce onto a single in-flight load, so at most one
//! underlying load runs at any time and every caller waiting on an attempt
//! observes the same outcome. A failed attempt is not cached: the next
//! `acquire()` starts a fresh load.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use doodletank_core::{Error, InputTensor, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A loaded classifier session, shared by every inference call
pub type ModelHandle = Arc<dyn ModelSession>;

/// A loaded model that can run forward passes.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Declared input names, in model order. May be empty when the runtime
    /// exposes no input metadata.
    fn input_names(&self) -> Vec<String>;

    /// Run one forward pass with `tensor` bound to `input_name`, returning
    /// the flattened values of the first output.
    async fn run(&self, input_name: &str, tensor: InputTensor) -> Result<Vec<f32>>;
}

/// Pluggable backend that fetches and initializes a model.
///
/// Implement this trait to plug other runtimes or test doubles into the
/// loader without coupling it to ONNX Runtime.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Fetch and initialize the model.
    async fn load(&self) -> Result<ModelHandle>;

    /// Human-readable description of the model resource, for logs
    fn describe(&self) -> String;
}

/// Observable loader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Unloaded,
    Loading,
    Loaded,
}

type SharedLoad = Shared<BoxFuture<'static, std::result::Result<ModelHandle, Arc<Error>>>>;

enum Slot {
    Unloaded,
    Loading { attempt: u64, load: SharedLoad },
    Loaded(ModelHandle),
}

struct LoaderInner {
    backend: Arc<dyn ModelBackend>,
    slot: Mutex<Slot>,
    attempts: AtomicU64,
}

impl LoaderInner {
    /// Settle an attempt. Only the attempt that owns the `Loading` slot may
    /// move it on.
    fn finish(&self, attempt: u64, outcome: &Result<ModelHandle>) {
        let mut slot = self.slot.lock();
        let owns_slot = matches!(&*slot, Slot::Loading { attempt: current, .. } if *current == attempt);
        if !owns_slot {
            return;
        }

        *slot = match outcome {
            Ok(handle) => Slot::Loaded(Arc::clone(handle)),
            Err(_) => Slot::Unloaded,
        };
    }
}

/// Single-flight, lazily-initialized model cache.
///
/// Cloning is cheap and every clone shares the same state, so one loader can
/// be created per process and handed to each consumer.
#[derive(Clone)]
pub struct ModelLoader {
    inner: Arc<LoaderInner>,
}

impl ModelLoader {
    /// Create a loader in the `Unloaded` state.
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                backend,
                slot: Mutex::new(Slot::Unloaded),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Get the model, loading it if needed.
    ///
    /// Returns the cached handle when loaded, joins the in-flight attempt when
    /// loading, and otherwise starts a new attempt. The attempt runs on the
    /// runtime independently of its callers, so dropping every caller does
    /// not cancel it.
    pub async fn acquire(&self) -> Result<ModelHandle> {
        let (load, started) = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Loaded(handle) => return Ok(Arc::clone(handle)),
                Slot::Loading { load, .. } => (load.clone(), false),
                Slot::Unloaded => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let load = self.start_attempt(attempt);
                    *slot = Slot::Loading {
                        attempt,
                        load: load.clone(),
                    };
                    (load, true)
                }
            }
        };

        if started {
            tokio::spawn(load.clone());
        }

        load.await.map_err(|err| shared_error(&err))
    }

    /// Cached handle, without loading.
    pub fn get(&self) -> Option<ModelHandle> {
        match &*self.inner.slot.lock() {
            Slot::Loaded(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Start a best-effort background load. Failures are logged, never
    /// returned.
    pub fn preload(&self) -> JoinHandle<()> {
        let loader = self.clone();
        tokio::spawn(async move {
            if let Err(e) = loader.acquire().await {
                warn!(model = %loader.describe(), error = %e, "background model preload failed");
            }
        })
    }

    pub fn state(&self) -> LoaderState {
        match &*self.inner.slot.lock() {
            Slot::Unloaded => LoaderState::Unloaded,
            Slot::Loading { .. } => LoaderState::Loading,
            Slot::Loaded(_) => LoaderState::Loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoaderState::Loaded
    }

    /// Number of underlying load attempts started so far
    pub fn load_count(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Description of the model resource
    pub fn describe(&self) -> String {
        self.inner.backend.describe()
    }

    fn start_attempt(&self, attempt: u64) -> SharedLoad {
        let backend = Arc::clone(&self.inner.backend);
        let inner: Weak<LoaderInner> = Arc::downgrade(&self.inner);

        async move {
            let model = backend.describe();
            info!(%model, attempt, "loading model");

            // A panicking backend must still settle the slot, or every later
            // waiter would poll a poisoned future.
            let outcome = match AssertUnwindSafe(backend.load()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::model_load("model backend panicked")),
            };
            match &outcome {
                Ok(_) => info!(%model, attempt, "model loaded successfully"),
                Err(e) => warn!(%model, attempt, error = %e, "failed to load model"),
            }

            if let Some(inner) = inner.upgrade() {
                inner.finish(attempt, &outcome);
            }
            outcome.map_err(Arc::new)
        }
        .boxed()
        .shared()
    }
}

/// Rebuild an owned error from the one shared between waiters.
fn shared_error(err: &Error) -> Error {
    match err {
        Error::ModelLoad(msg) => Error::ModelLoad(msg.clone()),
        other => Error::model_load(other.to_string()),
    }
}
