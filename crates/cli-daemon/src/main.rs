//! CLI entry point for handbraked
//!
//! Builds the watch configuration from an optional TOML file, environment
//! overrides and command line flags, then runs the daemon until Ctrl-C.

use clap::{CommandFactory, Parser};
use handbraked::{Daemon, WatchConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// handbraked: watch and convert videos in a directory using HandBrake
#[derive(Parser, Debug)]
#[command(name = "handbraked")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "handbraked -d WATCH_DIR -p PRESET_PATH [OPTIONS]")]
struct Args {
    /// Directory to watch and automatically convert new videos
    #[arg(short = 'd', long)]
    watch_dir: Option<PathBuf>,

    /// Interval in seconds between checking for new videos [default: 5]
    #[arg(short, long)]
    interval: Option<u64>,

    /// Suffix to add to converted videos. Matching files will be excluded from conversion [default: -x265]
    #[arg(short, long, allow_hyphen_values = true)]
    suffix: Option<String>,

    /// Path to HandBrake preset used for conversion
    #[arg(short, long)]
    preset: Option<PathBuf>,

    /// Preset name to use; must be declared in the preset file [default: first declared preset]
    #[arg(long)]
    preset_name: Option<String>,

    /// Minimum converted file size in bytes [default: 1000000]
    #[arg(short, long)]
    min_size: Option<u64>,

    /// Number of pending videos to always keep intact before starting to convert [default: 2]
    #[arg(short, long)]
    buffer_size: Option<usize>,

    /// Time in seconds to wait since a video's modification time before starting conversion [default: 10]
    #[arg(short = 't', long)]
    wait_time: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Encoder executable [default: HandBrakeCLI]
    #[arg(long)]
    encoder: Option<String>,

    /// Stop retrying a file after this many consecutive failures [default: never]
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Flags given on the command line take precedence over every other source
    fn apply_to(self, config: &mut WatchConfig) {
        if let Some(dir) = self.watch_dir {
            config.watch_dir = dir;
        }
        if let Some(secs) = self.interval {
            config.interval_secs = secs;
        }
        if let Some(suffix) = self.suffix {
            config.suffix = suffix;
        }
        if let Some(preset) = self.preset {
            config.preset_path = preset;
        }
        if let Some(name) = self.preset_name {
            config.preset_name = Some(name);
        }
        if let Some(bytes) = self.min_size {
            config.min_size_bytes = bytes;
        }
        if let Some(size) = self.buffer_size {
            config.buffer_size = size;
        }
        if let Some(secs) = self.wait_time {
            config.wait_time_secs = secs;
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(encoder) = self.encoder {
            config.encoder = encoder;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = Some(attempts);
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("handbraked={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args_os().len() < 2 {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    }
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match WatchConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut config = WatchConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    args.apply_to(&mut config);

    init_tracing(config.verbose);

    let daemon = match Daemon::new(config) {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("Failed to initialize daemon: {}", e);
            let _ = Args::command().print_help();
            return ExitCode::FAILURE;
        }
    };

    daemon
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C");
            } else {
                // Without a signal handler, run until killed
                std::future::pending::<()>().await;
            }
        })
        .await;

    ExitCode::SUCCESS
}
