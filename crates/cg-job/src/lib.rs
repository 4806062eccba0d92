//! # cg-job
//!
//! The video-to-GIF conversion core.
//!
//! This crate provides:
//!
//! - **[`EngineLoader`]** -- acquires the transcoding engine once per
//!   session and hands out a shared [`EngineHandle`].
//! - **[`stage_input`]** -- copies a source file into engine working storage.
//! - **[`build_args`]** -- maps [`ConversionParameters`](cg_core::ConversionParameters)
//!   to a filter graph and duration cap.
//! - **[`JobRunner`]** -- sequences staging, run, and extraction for one job
//!   at a time.
//! - **[`ProgressReporter`]** -- turns engine ratios into a 0--100 percentage.
//! - **[`OutputManager`]** -- owns the single live [`OutputResource`] and
//!   releases superseded ones.
//! - **[`Session`]** -- the context object tying all of the above together.

pub mod filter;
pub mod loader;
pub mod observer;
pub mod output;
pub mod progress;
pub mod runner;
pub mod session;
pub mod staging;

// Re-export key types at the crate root.
pub use filter::{build_args, FilterArgs};
pub use loader::{EngineHandle, EngineLoader, LoaderState};
pub use observer::JobObserver;
pub use output::{OutputManager, OutputResource};
pub use progress::{percent_from_ratio, ProgressReporter};
pub use runner::JobRunner;
pub use session::Session;
pub use staging::{stage_input, StagedInput};
