//! Unified error type for clipgif.
//!
//! Every stage of a conversion funnels its failures into [`Error`]. The
//! variant tells the caller which step broke; [`Error::is_retryable`] says
//! whether a fresh call can be expected to succeed without changing inputs.

/// Unified error type covering all failure modes in clipgif.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transcoding engine could not be resolved or initialised.
    #[error("Engine acquisition failed: {0}")]
    EngineAcquisition(String),

    /// A job was started without a source file or without a ready engine.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Reading the source file or writing it into working storage failed.
    #[error("Staging failed: {0}")]
    Staging(String),

    /// The engine run command failed (bad filter graph, decode error, ...).
    #[error("Run failed: {0}")]
    Run(String),

    /// The engine finished but produced no readable output.
    #[error("Output read failed: {0}")]
    OutputRead(String),

    /// Another job is already running on this engine.
    #[error("A conversion job is already in progress")]
    JobInProgress,

    /// User-supplied data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EngineAcquisition(_) => "engine_acquisition",
            Error::Precondition(_) => "precondition",
            Error::Staging(_) => "staging",
            Error::Run(_) => "run",
            Error::OutputRead(_) => "output_read",
            Error::JobInProgress => "job_in_progress",
            Error::Validation(_) => "validation",
            Error::Tool { .. } => "tool",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// Whether re-issuing the same call may succeed.
    ///
    /// Precondition and validation failures need different inputs; everything
    /// else leaves the engine usable for another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Precondition(_) | Error::Validation(_))
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Precondition`].
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    /// Wrap any error as a staging failure.
    pub fn staging(err: impl std::fmt::Display) -> Self {
        Error::Staging(err.to_string())
    }

    /// Wrap any error as a run failure.
    pub fn run(err: impl std::fmt::Display) -> Self {
        Error::Run(err.to_string())
    }

    /// Wrap any error as an output read failure.
    pub fn output_read(err: impl std::fmt::Display) -> Self {
        Error::OutputRead(err.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
