//! Native ffmpeg adapter for the [`Engine`] interface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::engine::{Engine, EngineDriver, RatioSink};
use crate::progress::ProgressParser;
use crate::tools::{ToolConfig, ToolRegistry};
use crate::workspace::Workspace;

/// Arguments prepended to every run: quiet banner, never read stdin,
/// overwrite outputs, and machine-readable progress on stderr.
const BASE_ARGS: &[&str] = &[
    "-hide_banner",
    "-nostdin",
    "-y",
    "-nostats",
    "-progress",
    "pipe:2",
];

/// Timeout for the `-version` probe done during acquisition.
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// FfmpegDriver
// ---------------------------------------------------------------------------

/// Resolves an ffmpeg executable and wraps it as an [`FfmpegEngine`].
#[derive(Debug, Clone)]
pub struct FfmpegDriver {
    config: cg_core::config::EngineConfig,
    registry: Option<ToolRegistry>,
}

impl FfmpegDriver {
    /// Driver that discovers ffmpeg from config/`PATH` on every acquisition.
    pub fn new(config: cg_core::config::EngineConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    /// Driver that uses an already-populated registry.
    pub fn from_registry(registry: ToolRegistry) -> Self {
        Self {
            config: cg_core::config::EngineConfig::default(),
            registry: Some(registry),
        }
    }
}

#[async_trait]
impl EngineDriver for FfmpegDriver {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn acquire(&self) -> cg_core::Result<Arc<dyn Engine>> {
        let registry = match self.registry {
            Some(ref registry) => registry.clone(),
            None => ToolRegistry::discover(&self.config),
        };

        let tool = registry
            .require("ffmpeg")
            .map_err(|e| cg_core::Error::EngineAcquisition(e.to_string()))?
            .clone();

        let output = ToolCommand::new(tool.path.clone())
            .arg("-version")
            .timeout(VERSION_PROBE_TIMEOUT)
            .execute()
            .await
            .map_err(|e| cg_core::Error::EngineAcquisition(e.to_string()))?;

        let version = output.stdout.lines().next().map(str::to_string);
        tracing::info!(
            "Using {} ({})",
            tool.path.display(),
            version.as_deref().unwrap_or("unknown version")
        );

        Ok(Arc::new(FfmpegEngine::new(tool, version)))
    }
}

// ---------------------------------------------------------------------------
// FfmpegEngine
// ---------------------------------------------------------------------------

/// An ffmpeg executable plus its private working storage.
pub struct FfmpegEngine {
    tool: ToolConfig,
    version: Option<String>,
    workspace: OnceCell<Workspace>,
    sink: RwLock<Option<RatioSink>>,
}

impl FfmpegEngine {
    /// Wrap a resolved ffmpeg tool. Storage is created by [`Engine::load`].
    pub fn new(tool: ToolConfig, version: Option<String>) -> Self {
        Self {
            tool,
            version,
            workspace: OnceCell::new(),
            sink: RwLock::new(None),
        }
    }

    /// First line of `ffmpeg -version`, if it was probed.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn storage(&self) -> cg_core::Result<&Workspace> {
        self.workspace
            .get()
            .ok_or_else(|| cg_core::Error::precondition("ffmpeg engine is not loaded"))
    }
}

impl std::fmt::Debug for FfmpegEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEngine")
            .field("path", &self.tool.path)
            .field("version", &self.version)
            .field("loaded", &self.workspace.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self) -> cg_core::Result<()> {
        let ws = self
            .workspace
            .get_or_try_init(|| async { Workspace::new() })
            .await?;
        tracing::debug!("ffmpeg working storage at {}", ws.root().display());
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.workspace.initialized()
    }

    async fn write_file(&self, name: &str, bytes: &[u8]) -> cg_core::Result<()> {
        self.storage()?.write_file(name, bytes).await
    }

    async fn read_file(&self, name: &str) -> cg_core::Result<Bytes> {
        self.storage()?.read_file(name).await
    }

    async fn remove_file(&self, name: &str) -> cg_core::Result<()> {
        self.storage()?.remove_file(name).await.map(|_| ())
    }

    async fn run(&self, args: &[String], cancel: CancellationToken) -> cg_core::Result<()> {
        let ws = self.storage()?;

        let mut cmd = ToolCommand::new(self.tool.path.clone());
        cmd.timeout(self.tool.timeout);
        cmd.current_dir(ws.root());
        cmd.args(BASE_ARGS.iter().copied());
        cmd.args(args.iter().cloned());

        tracing::info!("ffmpeg {}", args.join(" "));

        let mut parser = ProgressParser::from_args(args);
        let sink = self.sink.read().clone();

        cmd.execute_with_stderr_callback(
            |line| {
                tracing::trace!(target: "cg_engine::ffmpeg::stderr", "{line}");
                if let Some(ratio) = parser.feed(line) {
                    if let Some(ref sink) = sink {
                        sink(ratio);
                    }
                }
            },
            Some(cancel),
        )
        .await?;

        Ok(())
    }

    fn set_progress_sink(&self, sink: RatioSink) {
        *self.sink.write() = Some(sink);
    }
}
