//! Running one conversion job end to end.

use std::sync::Arc;

use cg_core::events::{EventBus, EventPayload};
use cg_core::{ConversionParameters, Error, JobId, Result, SourceFile, GIF_MIME_TYPE};
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::filter::{build_args, FilterArgs};
use crate::loader::EngineHandle;
use crate::observer::JobObserver;
use crate::output::{OutputManager, OutputResource};
use crate::staging::{input_key, stage_input};

/// Runs conversion jobs, one at a time, against an acquired engine.
///
/// A job goes through: guard, progress reset, engine bootstrap, staging,
/// run, output read, output install. Any failure stops the sequence and
/// leaves the previously installed output untouched.
pub struct JobRunner {
    outputs: Arc<OutputManager>,
    mime_type: String,
    gate: tokio::sync::Mutex<()>,
    cancel: parking_lot::Mutex<Option<CancellationToken>>,
    events: Option<Arc<EventBus>>,
}

impl JobRunner {
    pub fn new(outputs: Arc<OutputManager>, events: Option<Arc<EventBus>>) -> Self {
        Self {
            outputs,
            mime_type: GIF_MIME_TYPE.to_string(),
            gate: tokio::sync::Mutex::new(()),
            cancel: parking_lot::Mutex::new(None),
            events,
        }
    }

    /// Builder: MIME type attached to produced outputs.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn outputs(&self) -> &Arc<OutputManager> {
        &self.outputs
    }

    /// Whether a job currently holds the engine.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    /// Cancel the running job, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Convert `file` with `params` and install the result as the current
    /// output.
    ///
    /// Fails with [`Error::Precondition`] before touching any state when the
    /// engine or file is missing, and with [`Error::JobInProgress`] when
    /// another job is already running. The observer's `on_done` sees every
    /// outcome, rejections included.
    pub async fn run_job(
        &self,
        handle: Option<&EngineHandle>,
        file: Option<&SourceFile>,
        params: &ConversionParameters,
        observer: JobObserver,
    ) -> Result<OutputResource> {
        let (handle, file, _guard) = match self.admit(handle, file, params) {
            Ok(admitted) => admitted,
            Err(e) => {
                tracing::debug!("Job rejected: {e}");
                observer.done(Err(&e));
                return Err(e);
            }
        };

        let job_id = JobId::new();
        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let observer = Arc::new(observer);
        let reporter = handle.reporter();
        reporter.begin(job_id, Arc::clone(&observer));

        tracing::info!(
            "Job {job_id}: converting {} ({} fps, {} px, {})",
            file.name(),
            params.frames_per_second,
            params.output_width_px,
            params.duration_preset
        );
        self.emit(EventPayload::JobStarted { job_id });

        let input_name = input_key(job_id, file);
        let args = build_args(params);
        let output_name = format!("{}-{}", job_id.short(), args.output_name);

        let result = self
            .execute(handle, file, &input_name, &output_name, &args, token)
            .await;

        self.cleanup(handle, &[&input_name, &output_name]).await;
        reporter.finish();
        self.cancel.lock().take();

        match result {
            Ok(ref output) => {
                tracing::info!(
                    "Job {job_id}: produced {} ({} bytes)",
                    output.id(),
                    output.size_bytes()
                );
                self.emit(EventPayload::JobCompleted {
                    job_id,
                    output_id: output.id(),
                    size_bytes: output.size_bytes(),
                });
            }
            Err(ref e) => {
                tracing::warn!("Job {job_id} failed: {e}");
                self.emit(EventPayload::JobFailed {
                    job_id,
                    error: e.to_string(),
                });
            }
        }

        observer.done(result.as_ref());
        result
    }

    /// The guard: a ready engine, a file, valid parameters and a free gate.
    fn admit<'a>(
        &'a self,
        handle: Option<&'a EngineHandle>,
        file: Option<&'a SourceFile>,
        params: &ConversionParameters,
    ) -> Result<(&'a EngineHandle, &'a SourceFile, MutexGuard<'a, ()>)> {
        let handle = match handle {
            Some(h) if h.is_ready() => h,
            Some(_) => return Err(Error::precondition("engine is not ready")),
            None => return Err(Error::precondition("engine has not been acquired")),
        };
        let file = file.ok_or_else(|| Error::precondition("no source file selected"))?;
        params.validate()?;
        let guard = self.gate.try_lock().map_err(|_| Error::JobInProgress)?;
        Ok((handle, file, guard))
    }

    async fn execute(
        &self,
        handle: &EngineHandle,
        file: &SourceFile,
        input_name: &str,
        output_name: &str,
        args: &FilterArgs,
        token: CancellationToken,
    ) -> Result<OutputResource> {
        let engine = handle.engine();

        if !engine.is_loaded() {
            engine.load().await.map_err(|e| {
                Error::EngineAcquisition(format!("{} bootstrap failed: {e}", engine.name()))
            })?;
        }

        stage_input(handle, file, input_name).await?;

        let command = args.command_line(input_name, output_name);
        engine.run(&command, token).await.map_err(Error::run)?;

        let bytes = engine
            .read_file(output_name)
            .await
            .map_err(Error::output_read)?;
        if bytes.is_empty() {
            return Err(Error::OutputRead("engine produced an empty file".into()));
        }

        self.outputs.install_output(bytes, &self.mime_type).await
    }

    /// Remove per-job storage keys. Failures are logged only.
    async fn cleanup(&self, handle: &EngineHandle, names: &[&str]) {
        let engine = handle.engine();
        if !engine.is_loaded() {
            return;
        }
        for name in names {
            if let Err(e) = engine.remove_file(name).await {
                tracing::debug!("Could not remove {name} from engine storage: {e}");
            }
        }
    }

    fn emit(&self, payload: EventPayload) {
        if let Some(ref events) = self.events {
            events.broadcast(payload);
        }
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("busy", &self.is_busy())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}
