//! 发布结果统计窗口
//!
//! 发布循环每次提交调用 `record_attempt`，传输层回调对每个视频确认调用
//! `record_ack`。窗口在第 `size` 次尝试时关闭并返回汇总，随后清零。
//!
//! 确认可能早于对应的尝试被计数 (进程内传输在 `publish` 返回前就回调)。
//! 这种确认先记为待抵扣，在下一次尝试时计入，保证任何时刻
//! `successes <= attempts`。

use std::sync::Mutex;

/// 一个已关闭窗口的汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    pub successes: u32,
    pub attempts: u32,
}

impl WindowSummary {
    /// 成功率，`attempts == 0` 时为 0
    pub fn ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Default)]
struct WindowCounters {
    successes: u32,
    attempts: u32,
    /// 先于尝试到达的成功确认
    pending_credits: u32,
}

/// 线程安全的滑动统计窗口
#[derive(Debug)]
pub struct RateWindow {
    size: u32,
    counters: Mutex<WindowCounters>,
}

impl RateWindow {
    /// 创建窗口，`size` 为 0 时按 1 处理
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            counters: Mutex::new(WindowCounters::default()),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// 记录一次发布尝试 (无论同步提交是否成功)
    ///
    /// 第 `size` 次尝试时返回窗口汇总并清零计数。
    pub fn record_attempt(&self) -> Option<WindowSummary> {
        let mut counters = self.lock();
        counters.attempts += 1;
        if counters.pending_credits > 0 && counters.successes < counters.attempts {
            counters.pending_credits -= 1;
            counters.successes += 1;
        }

        if counters.attempts < self.size {
            return None;
        }

        let summary = WindowSummary {
            successes: counters.successes,
            attempts: counters.attempts,
        };
        counters.successes = 0;
        counters.attempts = 0;
        Some(summary)
    }

    /// 记录一个视频确认
    ///
    /// 失败确认不改变计数：未成功的尝试本身就是失败。
    pub fn record_ack(&self, success: bool) {
        if !success {
            return;
        }
        let mut counters = self.lock();
        if counters.successes < counters.attempts {
            counters.successes += 1;
        } else if counters.pending_credits < self.size {
            counters.pending_credits += 1;
        }
    }

    /// 当前未关闭窗口的计数
    pub fn current(&self) -> WindowSummary {
        let counters = self.lock();
        WindowSummary {
            successes: counters.successes,
            attempts: counters.attempts,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowCounters> {
        // 计数器始终保持一致状态，中毒后继续使用即可
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
