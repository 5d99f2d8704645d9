//! 采集速率控制器
//!
//! 每个窗口结束时根据成功率调整采集速率：
//! - `ratio < backoff_below`: 降一个步长 (不低于 `min_hz`)
//! - `ratio > speedup_above`: 升一个步长 (不高于 `max_hz`)
//! - 其余: 保持

use contracts::RateConfig;
use tracing::{debug, info};

use crate::pacing::PacingSender;
use crate::window::WindowSummary;

/// 根据窗口成功率计算下一个速率
///
/// 纯函数，不做初始钳位：`current_hz` 已在 `[min_hz, max_hz]` 内时结果也在其内。
pub fn next_rate(config: &RateConfig, current_hz: f64, ratio: f64) -> f64 {
    if ratio < config.backoff_below {
        (current_hz - config.step_hz).max(config.min_hz)
    } else if ratio > config.speedup_above {
        (current_hz + config.step_hz).min(config.max_hz)
    } else {
        current_hz
    }
}

/// 单个窗口的调整结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Decrease { from: f64, to: f64 },
    Increase { from: f64, to: f64 },
    /// 死区内或已在边界
    Hold(f64),
}

impl RateDecision {
    /// 调整后的速率
    pub fn rate_hz(&self) -> f64 {
        match *self {
            Self::Decrease { to, .. } | Self::Increase { to, .. } => to,
            Self::Hold(rate) => rate,
        }
    }

    /// 调整前的速率
    pub fn previous_hz(&self) -> f64 {
        match *self {
            Self::Decrease { from, .. } | Self::Increase { from, .. } => from,
            Self::Hold(rate) => rate,
        }
    }

    fn direction(&self) -> &'static str {
        match self {
            Self::Decrease { .. } => "decrease",
            Self::Increase { .. } => "increase",
            Self::Hold(_) => "hold",
        }
    }
}

/// 速率控制器
///
/// 唯一的速率写入方，调整结果通过 [`PacingSender`] 发布给采集循环。
#[derive(Debug)]
pub struct RateController {
    config: RateConfig,
    current_hz: f64,
    pacing: PacingSender,
}

impl RateController {
    /// 创建控制器，初始速率取 pacing 通道当前值并钳位到配置范围
    pub fn new(config: RateConfig, pacing: PacingSender) -> Self {
        let current_hz = config.clamp(pacing.rate_hz());
        pacing.set_rate(current_hz);
        observability::record_capture_rate(current_hz);
        Self {
            config,
            current_hz,
            pacing,
        }
    }

    pub fn current_hz(&self) -> f64 {
        self.current_hz
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// 根据关闭的窗口调整速率
    pub fn on_window(&mut self, summary: WindowSummary) -> RateDecision {
        observability::record_window_closed(summary.successes, summary.attempts);
        self.adjust(summary.ratio())
    }

    /// 根据成功率调整速率并发布到 pacing 通道
    pub fn adjust(&mut self, ratio: f64) -> RateDecision {
        let from = self.current_hz;
        let to = next_rate(&self.config, from, ratio);

        let decision = if to < from {
            RateDecision::Decrease { from, to }
        } else if to > from {
            RateDecision::Increase { from, to }
        } else {
            RateDecision::Hold(from)
        };

        if to != from {
            self.current_hz = to;
            self.pacing.set_rate(to);
            observability::record_capture_rate(to);
            info!(
                success_ratio = ratio,
                from_hz = from,
                to_hz = to,
                "Adjusted frame rate"
            );
        } else {
            debug!(success_ratio = ratio, rate_hz = from, "Frame rate unchanged");
        }
        observability::record_rate_adjustment(decision.direction());

        decision
    }
}
