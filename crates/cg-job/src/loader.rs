//! Engine acquisition.
//!
//! [`EngineLoader`] resolves the engine through its driver at most once per
//! session. Concurrent callers share one in-flight attempt and all see its
//! outcome; a failed attempt is not cached, so the next call tries again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};

use cg_core::events::{EventBus, EventPayload};
use cg_core::{Error, Result};
use cg_engine::{Engine, EngineDriver};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::progress::ProgressReporter;

/// Where acquisition currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

struct HandleInner {
    engine: Arc<dyn Engine>,
    reporter: Arc<ProgressReporter>,
    ready: AtomicBool,
}

/// A shared reference to an acquired engine and its progress reporter.
///
/// Handles are cheap to clone. A handle stays ready for the whole session,
/// including after failed jobs; only [`EngineLoader::shutdown`] retires it.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<HandleInner>,
}

impl EngineHandle {
    /// Wrap an acquired engine and register `reporter` as its progress sink.
    pub fn new(engine: Arc<dyn Engine>, reporter: Arc<ProgressReporter>) -> Self {
        engine.set_progress_sink(reporter.sink());
        Self {
            inner: Arc::new(HandleInner {
                engine,
                reporter,
                ready: AtomicBool::new(true),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.inner.engine
    }

    pub fn reporter(&self) -> &Arc<ProgressReporter> {
        &self.inner.reporter
    }

    fn retire(&self) {
        self.inner.ready.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.inner.engine.name())
            .field("loaded", &self.inner.engine.is_loaded())
            .field("ready", &self.is_ready())
            .finish()
    }
}

static ENVIRONMENT_CHECK: Once = Once::new();

/// Log once per process whether the host can run the engine with more than
/// one worker thread.
fn check_environment() {
    ENVIRONMENT_CHECK.call_once(|| match std::thread::available_parallelism() {
        Ok(n) if n.get() > 1 => {
            tracing::debug!("{n} hardware threads available to the engine");
        }
        Ok(_) => {
            tracing::warn!("Only one hardware thread available; conversions will be slow");
        }
        Err(e) => {
            tracing::warn!("Could not determine available parallelism: {e}");
        }
    });
}

/// Outcome of one acquisition attempt, shared by every caller awaiting it.
type Attempt = Shared<BoxFuture<'static, std::result::Result<EngineHandle, String>>>;

enum Slot {
    Empty,
    Pending { generation: u64, attempt: Attempt },
    Ready(EngineHandle),
}

/// Acquires the engine once and hands out shared [`EngineHandle`]s.
pub struct EngineLoader {
    driver: Arc<dyn EngineDriver>,
    reporter: Arc<ProgressReporter>,
    slot: Mutex<Slot>,
    generation: AtomicU64,
    state: Arc<RwLock<LoaderState>>,
    closed: AtomicBool,
    events: Option<Arc<EventBus>>,
}

impl EngineLoader {
    pub fn new(
        driver: Arc<dyn EngineDriver>,
        reporter: Arc<ProgressReporter>,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            driver,
            reporter,
            slot: Mutex::new(Slot::Empty),
            generation: AtomicU64::new(0),
            state: Arc::new(RwLock::new(LoaderState::Idle)),
            closed: AtomicBool::new(false),
            events,
        }
    }

    /// Resolve the engine, or return the handle from an earlier success.
    ///
    /// Callers arriving while an attempt is pending await that attempt and
    /// receive its outcome, success or failure. A failed attempt is dropped
    /// once it settles so the next call starts a fresh one.
    pub async fn acquire(&self) -> Result<EngineHandle> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::EngineAcquisition("session is shut down".into()));
        }
        check_environment();

        let (generation, attempt) = {
            let mut slot = self.slot.lock();
            match *slot {
                Slot::Ready(ref handle) => return Ok(handle.clone()),
                Slot::Pending {
                    generation,
                    ref attempt,
                } => (generation, attempt.clone()),
                Slot::Empty => {
                    let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                    let attempt = self.start_attempt();
                    *slot = Slot::Pending {
                        generation,
                        attempt: attempt.clone(),
                    };
                    (generation, attempt)
                }
            }
        };

        let outcome = attempt.await;

        let mut slot = self.slot.lock();
        let settles_slot =
            matches!(*slot, Slot::Pending { generation: g, .. } if g == generation);
        match outcome {
            Ok(handle) => {
                if self.closed.load(Ordering::Acquire) {
                    handle.retire();
                    return Err(Error::EngineAcquisition("session is shut down".into()));
                }
                if settles_slot {
                    *slot = Slot::Ready(handle.clone());
                }
                Ok(handle)
            }
            Err(message) => {
                if settles_slot {
                    *slot = Slot::Empty;
                }
                Err(Error::EngineAcquisition(message))
            }
        }
    }

    fn start_attempt(&self) -> Attempt {
        let driver = Arc::clone(&self.driver);
        let reporter = Arc::clone(&self.reporter);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        async move {
            let name = driver.name().to_string();
            *state.write() = LoaderState::Loading;
            tracing::info!("Acquiring {name} engine");
            emit(&events, EventPayload::EngineLoading {
                driver: name.clone(),
            });

            match driver.acquire().await {
                Ok(engine) => {
                    let handle = EngineHandle::new(engine, reporter);
                    *state.write() = LoaderState::Ready;
                    emit(&events, EventPayload::EngineReady { driver: name });
                    Ok(handle)
                }
                Err(e) => {
                    let message = match e {
                        Error::EngineAcquisition(message) => message,
                        other => other.to_string(),
                    };
                    tracing::error!("Engine acquisition failed: {message}");
                    *state.write() = LoaderState::Failed(message.clone());
                    emit(&events, EventPayload::EngineFailed {
                        driver: name,
                        error: message.clone(),
                    });
                    Err(message)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Start acquisition in the background. Failures are logged and leave
    /// the loader in [`LoaderState::Failed`].
    pub fn spawn_acquire(self: &Arc<Self>) -> JoinHandle<()> {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = loader.acquire().await {
                tracing::warn!("Background engine acquisition failed: {e}");
            }
        })
    }

    pub fn state(&self) -> LoaderState {
        self.state.read().clone()
    }

    /// The acquired handle, without waiting.
    pub fn handle(&self) -> Option<EngineHandle> {
        match *self.slot.lock() {
            Slot::Ready(ref handle) if handle.is_ready() => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.handle().is_some()
    }

    /// Retire the handle. Later acquisitions fail.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        if let Slot::Ready(ref handle) = *self.slot.lock() {
            handle.retire();
        }
    }
}

fn emit(events: &Option<Arc<EventBus>>, payload: EventPayload) {
    if let Some(ref events) = events {
        events.broadcast(payload);
    }
}

impl std::fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLoader")
            .field("driver", &self.driver.name())
            .field("state", &self.state())
            .finish()
    }
}
