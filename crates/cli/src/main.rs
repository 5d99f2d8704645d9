//! # Adaptive Streamer CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 推流管道编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::{LogConfig, LogFormat};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_streamer, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Adaptive streamer starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_streamer(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from `-v/-q` and `--log-format`
fn init_logging(cli: &Cli) -> Result<()> {
    let format = match cli.log_format {
        cli::LogFormat::Json => LogFormat::Json,
        cli::LogFormat::Pretty => LogFormat::Pretty,
        cli::LogFormat::Compact => LogFormat::Compact,
    };
    observability::init_logging(&LogConfig::from_verbosity(cli.quiet, cli.verbose, format))
}
