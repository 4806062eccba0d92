//! A scripted in-memory engine for exercising the job pipeline without
//! ffmpeg.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use cg_core::config::Config;
use cg_core::{Error, Result};
use cg_engine::{Engine, EngineDriver, RatioSink};
use cg_job::Session;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00";

/// What a scripted run does after pushing its ratios.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Write these bytes to the output name (last argument).
    Produce(Bytes),
    /// Fail like a bad filter graph would.
    Fail(String),
    /// Succeed without writing anything.
    NoOutput,
}

pub struct ScriptedEngine {
    files: Mutex<HashMap<String, Bytes>>,
    loaded: AtomicBool,
    load_calls: AtomicUsize,
    sink: Mutex<Option<RatioSink>>,
    ratios: Mutex<Vec<f64>>,
    outcome: Mutex<Outcome>,
    runs: Mutex<Vec<Vec<String>>>,
    hold: AtomicBool,
    pub started: Notify,
    pub proceed: Notify,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            loaded: AtomicBool::new(false),
            load_calls: AtomicUsize::new(0),
            sink: Mutex::new(None),
            ratios: Mutex::new(vec![0.25, 0.5, 1.0]),
            outcome: Mutex::new(Outcome::Produce(Bytes::from_static(GIF_BYTES))),
            runs: Mutex::new(Vec::new()),
            hold: AtomicBool::new(false),
            started: Notify::new(),
            proceed: Notify::new(),
        })
    }

    pub fn set_ratios(&self, ratios: Vec<f64>) {
        *self.ratios.lock() = ratios;
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    /// Make the next runs block after signalling `started` until `proceed`
    /// is notified or the job is cancelled.
    pub fn hold_runs(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().clone()
    }

    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if !self.is_loaded() {
            return Err(Error::precondition("scripted engine is not loaded"));
        }
        self.files
            .lock()
            .insert(name.to_string(), Bytes::copy_from_slice(bytes));
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Bytes> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()),
            })
    }

    async fn remove_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    async fn run(&self, args: &[String], cancel: CancellationToken) -> Result<()> {
        self.runs.lock().push(args.to_vec());

        let sink = self.sink.lock().clone();
        let ratios = self.ratios.lock().clone();
        if let Some(sink) = sink {
            for ratio in ratios {
                sink(ratio);
            }
        }

        if self.hold.load(Ordering::SeqCst) {
            self.started.notify_one();
            tokio::select! {
                _ = self.proceed.notified() => {}
                _ = cancel.cancelled() => return Err(Error::tool("scripted", "cancelled")),
            }
        }

        let outcome = self.outcome.lock().clone();
        match outcome {
            Outcome::Produce(bytes) => {
                let output = args
                    .last()
                    .ok_or_else(|| Error::tool("scripted", "no output argument"))?;
                self.files.lock().insert(output.clone(), bytes);
                Ok(())
            }
            Outcome::Fail(message) => Err(Error::tool("scripted", message)),
            Outcome::NoOutput => Ok(()),
        }
    }

    fn set_progress_sink(&self, sink: RatioSink) {
        *self.sink.lock() = Some(sink);
    }
}

/// Driver handing out one shared [`ScriptedEngine`], optionally failing the
/// first few acquisitions.
pub struct ScriptedDriver {
    pub engine: Arc<ScriptedEngine>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Duration,
}

impl ScriptedDriver {
    pub fn new(engine: Arc<ScriptedEngine>) -> Arc<Self> {
        Self::failing(engine, 0)
    }

    pub fn failing(engine: Arc<ScriptedEngine>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            engine,
            attempts: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
            delay: Duration::from_millis(20),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn acquire(&self) -> Result<Arc<dyn Engine>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::tool("scripted", "runtime download failed"));
        }
        Ok(self.engine.clone() as Arc<dyn Engine>)
    }
}

/// A session over a fresh scripted engine.
pub fn scripted_session() -> (Arc<Session>, Arc<ScriptedEngine>, Arc<ScriptedDriver>) {
    let engine = ScriptedEngine::new();
    let driver = ScriptedDriver::new(Arc::clone(&engine));
    let session = Session::with_driver(Config::default(), driver.clone()).unwrap();
    (Arc::new(session), engine, driver)
}
