//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! engine, conversion-default, output, and event settings. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::{ConversionParameters, DurationPreset, GIF_MIME_TYPE};
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub defaults: DefaultsConfig,
    pub output: OutputConfig,
    pub events: EventsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse a config file, failing on any error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref path) = self.engine.ffmpeg_path {
            if !path.exists() {
                warnings.push(format!(
                    "engine.ffmpeg_path {} does not exist; PATH lookup will be used",
                    path.display()
                ));
            }
        }

        if self.engine.timeout_secs == 0 {
            warnings.push("engine.timeout_secs is 0; every run will time out".into());
        }

        if let Err(e) = self.defaults.parameters().validate() {
            warnings.push(format!("defaults: {e}"));
        }

        if let Err(e) = self.output.check_download_name() {
            warnings.push(format!("output: {e}"));
        }

        if self.output.mime_type != GIF_MIME_TYPE {
            warnings.push(format!(
                "output.mime_type '{}' differs from the produced format ({GIF_MIME_TYPE})",
                self.output.mime_type
            ));
        }

        if self.events.capacity == 0 {
            warnings.push("events.capacity is 0; the event bus needs at least 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Transcoding engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit ffmpeg executable; `PATH` is searched when unset or missing.
    pub ffmpeg_path: Option<PathBuf>,
    /// Upper bound on a single engine run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    600
}

impl EngineConfig {
    /// Run timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Parameter values used when the caller does not supply its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub fps: u32,
    pub width: u32,
    pub preset: DurationPreset,
}

impl DefaultsConfig {
    /// The defaults as an (unvalidated) parameter set.
    pub fn parameters(&self) -> ConversionParameters {
        ConversionParameters {
            frames_per_second: self.fps,
            output_width_px: self.width,
            duration_preset: self.preset,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let params = ConversionParameters::default();
        Self {
            fps: params.frames_per_second,
            width: params.output_width_px,
            preset: params.duration_preset,
        }
    }
}

/// Output artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name used when the output is downloaded/saved.
    #[serde(default = "default_download_name")]
    pub download_name: String,
    /// MIME tag attached to every output resource.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_download_name() -> String {
    "output.gif".into()
}

fn default_mime_type() -> String {
    GIF_MIME_TYPE.into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_name: default_download_name(),
            mime_type: default_mime_type(),
        }
    }
}

impl OutputConfig {
    /// The download name must be a plain file name: no separators, no
    /// `.`/`..`, no NUL.
    pub fn check_download_name(&self) -> Result<()> {
        let name = self.download_name.as_str();
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if plain {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "download_name '{}' must be a plain file name",
                name.escape_default()
            )))
        }
    }
}

/// Event bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel buffer size.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.engine.timeout_secs, 600);
        assert!(cfg.engine.ffmpeg_path.is_none());
        assert_eq!(cfg.defaults.fps, 10);
        assert_eq!(cfg.defaults.width, 320);
        assert_eq!(cfg.defaults.preset, DurationPreset::Small);
        assert_eq!(cfg.output.download_name, "output.gif");
        assert_eq!(cfg.output.mime_type, "image/gif");
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn out_of_range_defaults_warn() {
        let mut cfg = Config::default();
        cfg.defaults.fps = 60;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("frames per second")));
    }

    #[test]
    fn missing_ffmpeg_path_warns() {
        let mut cfg = Config::default();
        cfg.engine.ffmpeg_path = Some(PathBuf::from("/nonexistent/ffmpeg_xyz"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("ffmpeg_path")));
    }

    #[test]
    fn download_name_with_separator_warns() {
        let mut cfg = Config::default();
        cfg.output.download_name = "../out.gif".into();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("download_name")));
    }

    #[test]
    fn download_name_must_be_plain() {
        let mut output = OutputConfig::default();
        assert!(output.check_download_name().is_ok());
        for bad in ["", ".", "..", "a/b.gif", "..\\b.gif", "out\0.gif"] {
            output.download_name = bad.into();
            assert!(
                matches!(output.check_download_name(), Err(Error::Validation(_))),
                "accepted {bad:?}"
            );
        }
        output.download_name = "my clip.gif".into();
        assert!(output.check_download_name().is_ok());
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"engine": {"timeout_secs": 30}, "defaults": {"preset": "long"}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.engine.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.defaults.preset, DurationPreset::Long);
        assert_eq!(cfg.defaults.fps, 10);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.engine.timeout_secs, 600);
        assert_eq!(cfg.events.capacity, 256);
    }

    #[test]
    fn parse_invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.defaults.width, 320);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/clipgif.json")));
        assert_eq!(cfg.output.download_name, "output.gif");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipgif.json");
        std::fs::write(&path, r#"{"output": {"download_name": "clip.gif"}}"#).unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.output.download_name, "clip.gif");
    }
}
