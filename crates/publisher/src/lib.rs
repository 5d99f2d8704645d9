//! # Publisher
//!
//! 发布端：帧编码、视频发布循环、遥测循环、连接监督。
//!
//! - [`PublishLoop`]: 从帧缓冲取帧 -> JPEG 编码 -> 发布，并驱动速率窗口
//! - [`TelemetryLoop`]: 按固定间隔发布位置报告，失败不影响视频路径
//! - [`ConnectionSupervisor`]: 处理传输事件 (确认、断线重连)
//! - [`transports`]: 内存传输 (测试/演练) 与 MQTT 传输

mod codec;
mod error;
mod metrics;
mod publish_loop;
mod supervisor;
mod telemetry_loop;
pub mod transports;

pub use codec::{FrameEncoder, JpegEncoder};
pub use error::{PublishError, Result};
pub use metrics::{PublisherMetrics, PublisherMetricsSnapshot};
pub use publish_loop::{PublishExit, PublishLoop, PublishSummary};
pub use supervisor::ConnectionSupervisor;
pub use telemetry_loop::{encode_report, TelemetryGenerator, TelemetryLoop};
