//! # Rate Control
//!
//! 根据发布成功率自适应调整采集速率。
//!
//! - [`RateWindow`]: 统计每 N 次发布尝试中的成功确认数
//! - [`RateController`]: 窗口关闭时调整速率 (AIMD 风格的固定步长)
//! - [`pacing_channel`]: 将速率从控制器传递给采集循环，读方总是看到最新值

mod controller;
mod pacing;
mod window;

pub use controller::{next_rate, RateController, RateDecision};
pub use pacing::{interval_for, pacing_channel, PacingReceiver, PacingSender};
pub use window::{RateWindow, WindowSummary};
