//! Conversion parameters and source-file references.
//!
//! Enums serialize in lowercase (via `serde(rename_all = "lowercase")`) and
//! implement `Display`/`FromStr` with the same spelling so CLI flags, config
//! files, and logs agree.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Accepted output frame rates.
pub const FPS_RANGE: RangeInclusive<u32> = 1..=30;

/// Accepted output widths in pixels.
pub const WIDTH_RANGE: RangeInclusive<u32> = 64..=1280;

/// MIME type of every produced output.
pub const GIF_MIME_TYPE: &str = "image/gif";

// ---------------------------------------------------------------------------
// DurationPreset
// ---------------------------------------------------------------------------

/// Named shorthand for how many seconds of source video go into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPreset {
    /// 3 seconds.
    Short,
    /// 5 seconds.
    #[default]
    Small,
    /// 10 seconds.
    Long,
}

impl DurationPreset {
    /// All presets, in display order.
    pub const ALL: [DurationPreset; 3] = [Self::Small, Self::Short, Self::Long];

    /// Output duration cap in whole seconds.
    pub fn seconds(self) -> u32 {
        match self {
            Self::Short => 3,
            Self::Small => 5,
            Self::Long => 10,
        }
    }
}

impl fmt::Display for DurationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Small => write!(f, "small"),
            Self::Long => write!(f, "long"),
        }
    }
}

impl FromStr for DurationPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "small" => Ok(Self::Small),
            "long" => Ok(Self::Long),
            other => Err(Error::Validation(format!(
                "unknown duration preset '{other}' (expected short, small, or long)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionParameters
// ---------------------------------------------------------------------------

/// User-tunable settings for one conversion.
///
/// The preset and the `(fps, width)` pair are independent axes: choosing
/// `short` caps the output at 3 seconds whatever the frame rate or width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionParameters {
    pub frames_per_second: u32,
    pub output_width_px: u32,
    pub duration_preset: DurationPreset,
}

impl ConversionParameters {
    /// Build a parameter set, rejecting values outside [`FPS_RANGE`] and
    /// [`WIDTH_RANGE`].
    pub fn new(
        frames_per_second: u32,
        output_width_px: u32,
        duration_preset: DurationPreset,
    ) -> Result<Self> {
        let params = Self {
            frames_per_second,
            output_width_px,
            duration_preset,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check range constraints on an already-built value (e.g. one
    /// deserialized from a config file).
    pub fn validate(&self) -> Result<()> {
        if !FPS_RANGE.contains(&self.frames_per_second) {
            return Err(Error::Validation(format!(
                "frames per second must be between {} and {}, got {}",
                FPS_RANGE.start(),
                FPS_RANGE.end(),
                self.frames_per_second
            )));
        }
        if !WIDTH_RANGE.contains(&self.output_width_px) {
            return Err(Error::Validation(format!(
                "output width must be between {} and {} px, got {}",
                WIDTH_RANGE.start(),
                WIDTH_RANGE.end(),
                self.output_width_px
            )));
        }
        Ok(())
    }
}

impl Default for ConversionParameters {
    fn default() -> Self {
        Self {
            frames_per_second: 10,
            output_width_px: 320,
            duration_preset: DurationPreset::Small,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// Where the bytes of a [`SourceFile`] live.
#[derive(Debug, Clone)]
pub enum SourceData {
    /// A file on the local filesystem, read at staging time.
    Path(PathBuf),
    /// Bytes already in memory.
    Bytes(Bytes),
}

/// A user-supplied video, owned by the caller and read once when staged.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    data: SourceData,
}

impl SourceFile {
    /// Reference a file on disk. The display name is the file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            name,
            data: SourceData::Path(path),
        }
    }

    /// Wrap in-memory bytes under the given name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: SourceData::Bytes(bytes.into()),
        }
    }

    /// Display name of the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing data.
    pub fn data(&self) -> &SourceData {
        &self.data
    }

    /// Lowercased file extension, `mp4` when the name has none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "mp4".to_string())
    }

    /// Read the full byte content.
    pub async fn read_bytes(&self) -> std::io::Result<Bytes> {
        match &self.data {
            SourceData::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
            SourceData::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}
