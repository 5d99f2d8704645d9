//! Streamer 指标收集模块
//!
//! 采集、编码、发布、速率调整与遥测的运行指标。

use metrics::{counter, gauge, histogram};

/// 记录一帧采集完成
pub fn record_frame_captured(source: &str) {
    counter!(
        "streamer_frames_captured_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// 记录缓冲区满时被覆盖的帧
pub fn record_frame_evicted() {
    counter!("streamer_frames_evicted_total").increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(depth: usize) {
    gauge!("streamer_buffer_depth").set(depth as f64);
}

/// 记录编码失败 (帧被丢弃)
pub fn record_encode_failure() {
    counter!("streamer_encode_failures_total").increment(1);
}

/// 记录编码后负载大小
pub fn record_payload_size(bytes: usize) {
    histogram!("streamer_payload_bytes").record(bytes as f64);
}

/// 记录一次发布提交
///
/// `accepted = false` 表示同步提交失败。
pub fn record_publish_attempt(topic: &str, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "streamer_publish_attempts_total",
        "topic" => topic.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录异步投递确认
pub fn record_publish_ack(topic: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "streamer_publish_acks_total",
        "topic" => topic.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录当前采集速率
pub fn record_capture_rate(rate_hz: f64) {
    gauge!("streamer_capture_rate_hz").set(rate_hz);
}

/// 记录一个已关闭的统计窗口
pub fn record_window_closed(successes: u32, attempts: u32) {
    counter!("streamer_rate_windows_total").increment(1);
    if attempts > 0 {
        histogram!("streamer_window_success_ratio").record(successes as f64 / attempts as f64);
    }
}

/// 记录速率调整方向 ("increase" / "decrease" / "hold")
pub fn record_rate_adjustment(direction: &'static str) {
    counter!(
        "streamer_rate_adjustments_total",
        "direction" => direction
    )
    .increment(1);
}

/// 记录遥测发布
pub fn record_telemetry_published(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "streamer_telemetry_reports_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录连接事件 ("connected" / "lost" / "reconnect_failed")
pub fn record_connection_event(kind: &'static str) {
    counter!(
        "streamer_connection_events_total",
        "kind" => kind
    )
    .increment(1);
}

/// 推流指标聚合器
///
/// 在内存中聚合指标，便于在退出时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct StreamMetricsAggregator {
    /// 发布尝试次数
    pub total_attempts: u64,

    /// 同步提交失败次数
    pub total_rejected: u64,

    /// 编码失败 (丢弃) 次数
    pub total_encode_failures: u64,

    /// 已关闭窗口数
    pub windows_closed: u64,

    /// 提速次数
    pub increases: u64,

    /// 降速次数
    pub decreases: u64,

    /// 窗口成功率统计
    pub success_ratio_stats: RunningStats,

    /// 采集速率统计 (每个窗口结束时的速率)
    pub rate_stats: RunningStats,

    /// 负载大小统计 (KiB)
    pub payload_stats: RunningStats,
}

impl StreamMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次发布尝试
    pub fn record_attempt(&mut self, accepted: bool, payload_bytes: usize) {
        self.total_attempts += 1;
        if accepted {
            self.payload_stats.push(payload_bytes as f64 / 1024.0);
        } else {
            self.total_rejected += 1;
        }
    }

    /// 记录编码失败
    pub fn record_encode_failure(&mut self) {
        self.total_encode_failures += 1;
    }

    /// 记录窗口结果及调整后的速率
    pub fn record_window(&mut self, ratio: f64, rate_before: f64, rate_after: f64) {
        self.windows_closed += 1;
        self.success_ratio_stats.push(ratio);
        self.rate_stats.push(rate_after);
        if rate_after > rate_before {
            self.increases += 1;
        } else if rate_after < rate_before {
            self.decreases += 1;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_attempts: self.total_attempts,
            total_rejected: self.total_rejected,
            total_encode_failures: self.total_encode_failures,
            windows_closed: self.windows_closed,
            increases: self.increases,
            decreases: self.decreases,
            rejection_rate: if self.total_attempts > 0 {
                self.total_rejected as f64 / self.total_attempts as f64 * 100.0
            } else {
                0.0
            },
            success_ratio: StatsSummary::from(&self.success_ratio_stats),
            rate_hz: StatsSummary::from(&self.rate_stats),
            payload_kib: StatsSummary::from(&self.payload_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_attempts: u64,
    pub total_rejected: u64,
    pub total_encode_failures: u64,
    pub windows_closed: u64,
    pub increases: u64,
    pub decreases: u64,
    pub rejection_rate: f64,
    pub success_ratio: StatsSummary,
    pub rate_hz: StatsSummary,
    pub payload_kib: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Stream Metrics Summary ===")?;
        writeln!(f, "Publish attempts: {}", self.total_attempts)?;
        writeln!(
            f,
            "Rejected submissions: {} ({:.2}%)",
            self.total_rejected, self.rejection_rate
        )?;
        writeln!(f, "Dropped (encode failure): {}", self.total_encode_failures)?;
        writeln!(
            f,
            "Windows: {} (up {}, down {})",
            self.windows_closed, self.increases, self.decreases
        )?;
        writeln!(f, "Window success ratio: {}", self.success_ratio)?;
        writeln!(f, "Capture rate (Hz): {}", self.rate_hz)?;
        writeln!(f, "Payload size (KiB): {}", self.payload_kib)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_windows() {
        let mut aggregator = StreamMetricsAggregator::new();

        aggregator.record_window(1.0, 10.0, 11.0);
        aggregator.record_window(0.5, 11.0, 10.0);
        aggregator.record_window(0.85, 10.0, 10.0);

        assert_eq!(aggregator.windows_closed, 3);
        assert_eq!(aggregator.increases, 1);
        assert_eq!(aggregator.decreases, 1);
        assert!((aggregator.rate_stats.max() - 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_attempts() {
        let mut aggregator = StreamMetricsAggregator::new();
        aggregator.record_attempt(true, 2048);
        aggregator.record_attempt(false, 0);
        aggregator.record_encode_failure();

        let summary = aggregator.summary();
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.total_rejected, 1);
        assert_eq!(summary.total_encode_failures, 1);
        assert!((summary.rejection_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.payload_kib.count, 1);
        assert!((summary.payload_kib.mean - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_attempts: 100,
            total_rejected: 5,
            rejection_rate: 5.0,
            windows_closed: 10,
            rate_hz: StatsSummary {
                count: 10,
                min: 10.0,
                max: 14.0,
                mean: 12.0,
                std_dev: 1.0,
            },
            ..Default::default()
        };

        let output = format!("{}", summary);
        assert!(output.contains("Publish attempts: 100"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("Payload size (KiB): N/A"));
    }
}
