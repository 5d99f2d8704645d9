//! # Observability
//!
//! 日志与指标：
//!
//! - [`init_logging`]: 安装 tracing 订阅者，`RUST_LOG` 优先于命令行给出的级别
//! - [`serve_metrics`]: 在指定端口暴露 Prometheus 指标
//! - [`metrics`]: 推流各阶段的指标记录函数与运行统计
//!
//! ```ignore
//! use observability::{init_logging, LogConfig, LogFormat};
//!
//! init_logging(&LogConfig::from_verbosity(false, 1, LogFormat::Compact))?;
//! observability::record_capture_rate(12.0);
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_buffer_depth, record_capture_rate, record_connection_event, record_encode_failure,
    record_frame_captured, record_frame_evicted, record_payload_size, record_publish_ack,
    record_publish_attempt, record_rate_adjustment, record_telemetry_published,
    record_window_closed, MetricsSummary, RunningStats, StatsSummary, StreamMetricsAggregator,
};

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 结构化日志 (每行一条)
    Json,
    /// 多行、人类可读
    #[default]
    Pretty,
    /// 紧凑单行
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `RUST_LOG` 未设置时使用的过滤指令
    pub default_directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_verbosity(false, 0, LogFormat::default())
    }
}

impl LogConfig {
    /// Map `-q` / `-v` counts to a level: quiet = error, 0 = info, 1 = debug, 2+ = trace
    pub fn from_verbosity(quiet: bool, verbose: u8, format: LogFormat) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            format,
            default_directive: level.to_string(),
        }
    }
}

/// 安装全局 tracing 订阅者 (每个进程一次)
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_directive))
        .with_context(|| format!("Invalid log directive '{}'", config.default_directive))?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(format = ?config.format, "logging initialized");
    Ok(())
}

/// Install the Prometheus recorder with an HTTP listener on `0.0.0.0:port`
///
/// Must be called from within a tokio runtime. Metrics recorded before this
/// call are lost.
pub fn serve_metrics(port: u16) -> Result<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to serve Prometheus metrics on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint listening");
    Ok(addr)
}
