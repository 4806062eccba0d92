//! # cg-engine
//!
//! The transcoding engine boundary for clipgif.
//!
//! This crate provides:
//!
//! - **Engine driver interface** ([`Engine`], [`EngineDriver`]) -- the
//!   load / working-storage / run / progress contract the conversion core is
//!   written against.
//! - **ffmpeg adapter** ([`FfmpegDriver`], [`FfmpegEngine`]) -- the concrete
//!   driver, backed by a native ffmpeg executable resolved at startup.
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   cancellation, and line-by-line stderr streaming.
//! - **Working storage** ([`Workspace`]) -- a temporary directory addressed
//!   by plain file names.
//! - **Progress parsing** ([`ProgressParser`]) -- turns `-progress` output
//!   into completion ratios.

pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod progress;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{Engine, EngineDriver, RatioSink};
pub use ffmpeg::{FfmpegDriver, FfmpegEngine};
pub use progress::ProgressParser;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
