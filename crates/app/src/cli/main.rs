//! Multiband CLI Application

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "multiband")]
#[command(about = "Stereo peak filter plugin core, driven from the command line", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the parameter layout
    Params {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a sine through the plugin offline and measure the gain
    Render {
        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        tone: f32,

        /// Length of the render in seconds
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,

        /// Sample rate in Hz (defaults to the configured rate)
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Maximum block size (defaults to the configured size)
        #[arg(long)]
        block_size: Option<u32>,

        #[command(flatten)]
        peak: PeakArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the magnitude response of the current peak filter
    Response {
        /// Number of log-spaced points between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 24)]
        points: usize,

        /// Sample rate in Hz (defaults to the configured rate)
        #[arg(long)]
        sample_rate: Option<u32>,

        #[command(flatten)]
        peak: PeakArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a filtered test tone on the output device
    Play {
        /// Test tone frequency in Hz
        #[arg(long, default_value_t = 1000.0)]
        tone: f32,

        /// Playback duration in seconds
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,

        #[command(flatten)]
        peak: PeakArgs,

        /// Reload parameters when a preset file changes
        #[arg(long)]
        watch: bool,
    },

    /// List output devices
    Devices,

    /// Manage presets
    #[command(subcommand)]
    Preset(PresetCommand),

    /// Inspect or reset the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Peak filter overrides applied on top of the loaded preset
#[derive(Args, Debug, Clone, Default)]
pub struct PeakArgs {
    /// Peak gain in dB
    #[arg(long, allow_hyphen_values = true)]
    gain: Option<f32>,

    /// Peak center frequency in Hz
    #[arg(long)]
    freq: Option<f32>,

    /// Peak quality
    #[arg(long)]
    q: Option<f32>,

    /// Preset to load before applying overrides
    #[arg(long)]
    preset: Option<String>,
}

#[derive(Subcommand)]
enum PresetCommand {
    /// List saved presets
    List,
    /// Save the given settings as a preset
    Save {
        name: String,
        #[command(flatten)]
        peak: PeakArgs,
    },
    /// Show the values stored in a preset
    Load { name: String },
    /// Delete a preset
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show where configuration and presets live
    Path,
    /// Delete the configuration file
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Multiband starting");

    let ctx = commands::Context::load(cli.config_dir).await?;

    match cli.command {
        Command::Params { json } => commands::params(&ctx, json),
        Command::Render {
            tone,
            seconds,
            sample_rate,
            block_size,
            peak,
            json,
        } => {
            commands::render(&ctx, tone, seconds, sample_rate, block_size, &peak, json).await
        }
        Command::Response {
            points,
            sample_rate,
            peak,
            json,
        } => commands::response(&ctx, points, sample_rate, &peak, json).await,
        Command::Play {
            tone,
            seconds,
            peak,
            watch,
        } => commands::play(&ctx, tone, seconds, &peak, watch).await,
        Command::Devices => commands::devices(),
        Command::Preset(command) => match command {
            PresetCommand::List => commands::preset_list(&ctx).await,
            PresetCommand::Save { name, peak } => commands::preset_save(&ctx, &name, &peak).await,
            PresetCommand::Load { name } => commands::preset_load(&ctx, &name).await,
            PresetCommand::Delete { name } => commands::preset_delete(&ctx, &name).await,
        },
        Command::Config(command) => match command {
            ConfigCommand::Path => commands::config_path(&ctx),
            ConfigCommand::Reset => commands::config_reset(&ctx).await,
        },
    }
}
