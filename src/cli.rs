use cg_core::DurationPreset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipgif")]
#[command(author, version, about = "Turn a local video into a short animated GIF")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the start of a video into a GIF
    Convert {
        /// Video file to convert
        #[arg(required = true)]
        input: PathBuf,

        /// Frames per second (1-30)
        #[arg(long)]
        fps: Option<u32>,

        /// Output width in pixels (64-1280); height keeps the aspect ratio
        #[arg(long)]
        width: Option<u32>,

        /// Clip length: short (3s), small (5s) or long (10s)
        #[arg(long)]
        preset: Option<DurationPreset>,

        /// Output file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
