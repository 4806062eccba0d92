//! Parameter to filter-graph translation.

use cg_core::ConversionParameters;

/// Default output file name, also used as the download name.
pub const OUTPUT_NAME: &str = "output.gif";

/// Engine arguments derived from a [`ConversionParameters`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterArgs {
    /// Filter graph, e.g. `fps=10,scale=320:-1:flags=lanczos`.
    pub filter: String,
    /// Duration cap in whole seconds, as passed to `-t`.
    pub duration_seconds: String,
    /// Name of the produced file.
    pub output_name: String,
}

impl FilterArgs {
    /// Ordered run arguments: input, filter graph, duration cap, output.
    pub fn command_line(&self, input_name: &str, output_name: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            input_name.to_string(),
            "-vf".to_string(),
            self.filter.clone(),
            "-t".to_string(),
            self.duration_seconds.clone(),
            output_name.to_string(),
        ]
    }
}

/// Build the filter graph and duration cap for `params`.
///
/// Width is fixed and height follows the source aspect ratio (`-1`), with
/// Lanczos resampling. The duration comes from the preset alone.
pub fn build_args(params: &ConversionParameters) -> FilterArgs {
    FilterArgs {
        filter: format!(
            "fps={},scale={}:-1:flags=lanczos",
            params.frames_per_second, params.output_width_px
        ),
        duration_seconds: params.duration_preset.seconds().to_string(),
        output_name: OUTPUT_NAME.to_string(),
    }
}
