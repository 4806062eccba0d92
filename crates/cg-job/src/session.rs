//! Session wiring.

use std::sync::Arc;

use cg_core::config::Config;
use cg_core::events::EventBus;
use cg_core::{ConversionParameters, Result, SessionId, SourceFile};
use cg_engine::{EngineDriver, FfmpegDriver};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::loader::EngineLoader;
use crate::observer::JobObserver;
use crate::output::{OutputManager, OutputResource};
use crate::progress::ProgressReporter;
use crate::runner::JobRunner;

/// Everything one user session needs: the event bus, the engine loader, a
/// job runner and the output manager.
pub struct Session {
    id: SessionId,
    config: Config,
    events: Arc<EventBus>,
    reporter: Arc<ProgressReporter>,
    loader: Arc<EngineLoader>,
    runner: JobRunner,
}

impl Session {
    /// A session backed by the native ffmpeg driver.
    pub fn new(config: Config) -> Result<Self> {
        let driver = Arc::new(FfmpegDriver::new(config.engine.clone()));
        Self::with_driver(config, driver)
    }

    /// A session backed by an arbitrary engine driver.
    pub fn with_driver(config: Config, driver: Arc<dyn EngineDriver>) -> Result<Self> {
        let events = Arc::new(EventBus::new(config.events.capacity));
        let reporter = Arc::new(ProgressReporter::new(Some(Arc::clone(&events))));
        let loader = Arc::new(EngineLoader::new(
            driver,
            Arc::clone(&reporter),
            Some(Arc::clone(&events)),
        ));
        let outputs = Arc::new(OutputManager::new(&config.output, Some(Arc::clone(&events)))?);
        let runner = JobRunner::new(outputs, Some(Arc::clone(&events)))
            .with_mime_type(config.output.mime_type.clone());

        let id = SessionId::new();
        tracing::debug!("Session {id} created");
        Ok(Self {
            id,
            config,
            events,
            reporter,
            loader,
            runner,
        })
    }

    /// Begin acquiring the engine in the background.
    pub fn start(&self) -> JoinHandle<()> {
        self.loader.spawn_acquire()
    }

    /// Acquire the engine if needed, then run one job.
    pub async fn convert(
        &self,
        file: &SourceFile,
        params: &ConversionParameters,
        observer: JobObserver,
    ) -> Result<OutputResource> {
        let handle = self.loader.acquire().await?;
        self.runner
            .run_job(Some(&handle), Some(file), params, observer)
            .await
    }

    /// Parameters from the `[defaults]` config section.
    pub fn default_parameters(&self) -> Result<ConversionParameters> {
        let params = self.config.defaults.parameters();
        params.validate()?;
        Ok(params)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn loader(&self) -> &Arc<EngineLoader> {
        &self.loader
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Watch the progress percentage.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.reporter.subscribe()
    }

    pub fn current_output(&self) -> Option<OutputResource> {
        self.runner.outputs().current()
    }

    /// Cancel any running job, retire the engine and release the output.
    pub fn shutdown(&self) {
        self.runner.cancel();
        self.loader.shutdown();
        self.runner.outputs().close();
        tracing::debug!("Session {} shut down", self.id);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("loader", &self.loader)
            .field("runner", &self.runner)
            .finish()
    }
}
