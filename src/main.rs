mod cli;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cg_core::config::Config;
use cg_core::{ConversionParameters, SourceFile};
use cg_engine::ToolRegistry;
use cg_job::{JobObserver, Session};
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipgif=trace,cg_job=trace,cg_engine=trace,cg_core=debug".to_string()
        } else {
            "clipgif=info,cg_job=info,cg_engine=warn,cg_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            input,
            fps,
            width,
            preset,
            output,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let params = resolve_parameters(&config, fps, width, preset)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(config, &input, &params, output.as_deref()))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipgif {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Overlay command-line values on the configured defaults.
fn resolve_parameters(
    config: &Config,
    fps: Option<u32>,
    width: Option<u32>,
    preset: Option<cg_core::DurationPreset>,
) -> Result<ConversionParameters> {
    let defaults = config.defaults.parameters();
    let params = ConversionParameters::new(
        fps.unwrap_or(defaults.frames_per_second),
        width.unwrap_or(defaults.output_width_px),
        preset.unwrap_or(defaults.duration_preset),
    )?;
    Ok(params)
}

async fn convert(
    config: Config,
    input: &Path,
    params: &ConversionParameters,
    output: Option<&Path>,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let session = Session::new(config)?;

    let observer = JobObserver::noop().on_progress(|percent| {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\rConverting... {percent:>3}%");
        let _ = stderr.flush();
    });

    let result = session
        .convert(&SourceFile::from_path(input), params, observer)
        .await;
    eprintln!();

    let resource = result.with_context(|| format!("Failed to convert {}", input.display()))?;
    let dest = save_output(&resource, output).await?;

    println!("Wrote {} ({} bytes)", dest.display(), resource.size_bytes());
    session.shutdown();
    Ok(())
}

/// Save into a directory under the download name, or to an explicit file.
async fn save_output(resource: &cg_job::OutputResource, output: Option<&Path>) -> Result<PathBuf> {
    match output {
        Some(path) if !path.is_dir() => {
            resource.save_as(path).await?;
            Ok(path.to_path_buf())
        }
        Some(dir) => Ok(resource.save_to(dir).await?),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(resource.save_to(&cwd).await?)
        }
    }
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.engine);
    let tools = registry.check_all();
    let mut ffmpeg_ok = false;

    for tool in &tools {
        let status = if tool.available { "✓" } else { "✗" };
        if tool.name == "ffmpeg" {
            ffmpeg_ok = tool.available;
        }

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if ffmpeg_ok {
        println!("ffmpeg is available; conversions are enabled.");
    } else {
        println!("ffmpeg is missing. Install it or set engine.ffmpeg_path in the config.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            Config::load(p).with_context(|| format!("Invalid config {}", p.display()))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }

    let defaults = config.defaults.parameters();
    println!(
        "  Defaults: {} fps, {} px wide, {} ({}s)",
        defaults.frames_per_second,
        defaults.output_width_px,
        defaults.duration_preset,
        defaults.duration_preset.seconds()
    );
    match config.engine.ffmpeg_path {
        Some(ref p) => println!("  ffmpeg: {}", p.display()),
        None => println!("  ffmpeg: from PATH"),
    }
    println!("  Timeout: {}s", config.engine.timeout_secs);
    println!("  Download name: {}", config.output.download_name);

    Ok(())
}
