//! The engine driver interface.
//!
//! The conversion core talks to a transcoding engine only through
//! [`Engine`]: a bootstrap step, a small working storage addressed by file
//! name, a CLI-style run command, and a progress-ratio hook. An
//! [`EngineDriver`] knows how to resolve one concrete engine at startup.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Receiver of raw completion ratios (`0.0..=1.0`, not necessarily
/// monotonic) pushed by an engine while a run is in progress.
pub type RatioSink = Arc<dyn Fn(f64) + Send + Sync>;

/// A loaded transcoding engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name used in logs and events (e.g. "ffmpeg").
    fn name(&self) -> &str;

    /// One-time in-process setup. Calling it again after success is a no-op.
    async fn load(&self) -> cg_core::Result<()>;

    /// Whether [`load`](Engine::load) has completed.
    fn is_loaded(&self) -> bool;

    /// Store `bytes` in working storage under `name`, replacing any previous
    /// content.
    async fn write_file(&self, name: &str, bytes: &[u8]) -> cg_core::Result<()>;

    /// Read the content stored under `name`.
    async fn read_file(&self, name: &str) -> cg_core::Result<Bytes>;

    /// Remove `name` from working storage. Missing files are not an error.
    async fn remove_file(&self, name: &str) -> cg_core::Result<()>;

    /// Execute the engine with ordered CLI-style arguments whose file
    /// operands are working-storage names.
    ///
    /// Progress ratios are delivered to the registered sink only while this
    /// future is pending.
    async fn run(&self, args: &[String], cancel: CancellationToken) -> cg_core::Result<()>;

    /// Register the single progress sink. Replaces any previous sink.
    fn set_progress_sink(&self, sink: RatioSink);
}

/// Resolves a concrete [`Engine`].
#[async_trait]
pub trait EngineDriver: Send + Sync {
    /// Short name of the driver (e.g. "ffmpeg").
    fn name(&self) -> &str;

    /// Locate and verify the engine's runtime. Does not bootstrap it.
    async fn acquire(&self) -> cg_core::Result<Arc<dyn Engine>>;
}
