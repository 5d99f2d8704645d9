//! # Capture
//!
//! 采集端：视频源 -> 定速采集 -> 帧缓冲。
//!
//! - [`frame_buffer`]: 容量有界、满时覆盖最旧帧的单生产者/单消费者队列
//! - [`CaptureLoop`]: 按 pacing 通道给出的速率读取视频源并缩放到目标分辨率
//! - [`sources`]: 图像序列、合成图案，以及 `video` 特性下的视频文件/采集设备

mod buffer;
mod capture_loop;
mod error;
mod metrics;
pub mod sources;

pub use buffer::{frame_buffer, FrameReader, FrameWriter};
pub use capture_loop::{CaptureExit, CaptureLoop, CaptureState};
pub use error::{CaptureError, Result};
pub use metrics::{CaptureMetrics, CaptureMetricsSnapshot};
pub use sources::{ConfiguredSource, ImageSequenceSource, SyntheticSource};
#[cfg(feature = "video")]
pub use sources::VideoSource;
