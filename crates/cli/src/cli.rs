//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Adaptive Streamer - video + telemetry over pub/sub with success-driven frame rate
#[derive(Parser, Debug)]
#[command(
    name = "adaptive-streamer",
    author,
    version,
    about = "Adaptive video and telemetry streamer",
    long_about = "Captures frames from a video source, publishes them as JPEG to a \n\
                  pub/sub broker and adapts the capture rate to the delivery success \n\
                  ratio. A synthetic GPS report is published alongside on its own topic."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAMER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STREAMER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streamer
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "streamer.toml",
        env = "STREAMER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override broker host from configuration
    #[arg(long, env = "STREAMER_HOST")]
    pub host: Option<String>,

    /// Override broker port from configuration
    #[arg(long, env = "STREAMER_PORT")]
    pub port: Option<u16>,

    /// Override the video source path (image directory, video file or device input)
    #[arg(long, env = "STREAMER_SOURCE_PATH")]
    pub source_path: Option<PathBuf>,

    /// Override the transport kind
    #[arg(long, value_enum, env = "STREAMER_TRANSPORT")]
    pub transport: Option<TransportArg>,

    /// Stop after this many seconds (0 = run until the source ends)
    #[arg(long, default_value = "0", env = "STREAMER_DURATION")]
    pub duration: u64,

    /// Validate configuration and exit without streaming
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STREAMER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long, conflicts_with = "toml")]
    pub json: bool,

    /// Print the effective configuration as TOML (all defaults filled in)
    #[arg(long)]
    pub toml: bool,
}

/// Transport kind override
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportArg {
    /// MQTT broker
    Mqtt,
    /// In-process loopback
    Memory,
}

impl From<TransportArg> for contracts::TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Mqtt => Self::Mqtt,
            TransportArg::Memory => Self::Memory,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
