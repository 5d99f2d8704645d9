//! StreamBlueprint - Config Loader 输出
//!
//! 描述完整的推流配置：传输、视频源、速率自适应、遥测。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{ConnectOptions, QosLevel, Resolution, CANONICAL_HEIGHT, CANONICAL_WIDTH};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的推流配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 传输层设置
    #[serde(default)]
    pub transport: TransportConfig,

    /// 视频通道设置
    #[serde(default)]
    pub video: VideoConfig,

    /// 速率自适应设置
    #[serde(default)]
    pub rate: RateConfig,

    /// 遥测通道设置
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// 传输层类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MQTT broker
    #[default]
    Mqtt,
    /// 进程内回环 (测试/演示)
    Memory,
}

/// 传输层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// 传输层类型
    pub kind: TransportKind,

    /// Broker 地址
    pub host: String,

    /// Broker 端口
    pub port: u16,

    /// 客户端 ID
    pub client_id: String,

    /// 心跳间隔 (秒)
    pub keepalive_secs: u64,

    /// 最大未确认消息数
    pub max_inflight: u16,

    /// 单条消息最大字节数 (需容纳一帧编码后的图像)
    pub max_payload_bytes: usize,

    /// 投递等级
    pub qos: QosLevel,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            host: "localhost".to_string(),
            port: 1883,
            client_id: "adaptive-streamer".to_string(),
            keepalive_secs: 60,
            max_inflight: 20,
            max_payload_bytes: 10_485_760,
            qos: QosLevel::AtMostOnce,
        }
    }
}

impl TransportConfig {
    /// Build transport session options
    pub fn to_connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            keepalive: Duration::from_secs(self.keepalive_secs),
            max_inflight: self.max_inflight,
            max_payload_bytes: self.max_payload_bytes,
            qos: self.qos,
        }
    }
}

/// 视频通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// 视频帧发布主题
    pub topic: String,

    /// 标准化宽度
    pub width: u32,

    /// 标准化高度
    pub height: u32,

    /// JPEG 质量 (1-100)
    pub jpeg_quality: u8,

    /// 帧缓冲容量 (满时覆盖最旧帧)
    pub buffer_capacity: usize,

    /// 视频源
    pub source: SourceConfig,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            topic: "test".to_string(),
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            jpeg_quality: 95,
            buffer_capacity: 2,
            source: SourceConfig::default(),
        }
    }
}

impl VideoConfig {
    /// Target resolution frames are resized to
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// 视频源配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// 图像序列目录 (按文件名排序)
    ImageSequence {
        path: PathBuf,
        fps: f64,
        #[serde(default)]
        loop_playback: bool,
    },

    /// 合成测试图案
    Synthetic {
        fps: f64,
        #[serde(default = "default_synthetic_width")]
        width: u32,
        #[serde(default = "default_synthetic_height")]
        height: u32,
        /// 帧数上限 (None = 无限)
        #[serde(default)]
        max_frames: Option<u64>,
    },

    /// 视频文件 (mp4/avi 等)，初始帧率取自容器
    VideoFile { path: PathBuf },

    /// 采集设备，`format` 为输入格式名 (如 `v4l2`、`lavfi`)，`input` 为设备路径或滤镜描述
    VideoDevice { format: String, input: String },
}

fn default_synthetic_width() -> u32 {
    CANONICAL_WIDTH
}

fn default_synthetic_height() -> u32 {
    CANONICAL_HEIGHT
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Synthetic {
            fps: 30.0,
            width: CANONICAL_WIDTH,
            height: CANONICAL_HEIGHT,
            max_frames: None,
        }
    }
}

impl SourceConfig {
    /// Short type name for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ImageSequence { .. } => "image_sequence",
            Self::Synthetic { .. } => "synthetic",
            Self::VideoFile { .. } => "video_file",
            Self::VideoDevice { .. } => "video_device",
        }
    }
}

/// 速率自适应配置
///
/// 比较使用严格不等号：`ratio < backoff_below` 降速，`ratio > speedup_above` 提速，
/// 边界值本身落在死区内。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// 采集速率下限 (Hz)
    pub min_hz: f64,

    /// 采集速率上限 (Hz)
    pub max_hz: f64,

    /// 每个窗口的调整步长 (Hz)
    pub step_hz: f64,

    /// 统计窗口大小 (发布次数)
    pub window_size: u32,

    /// 成功率低于此值时降速
    pub backoff_below: f64,

    /// 成功率高于此值时提速
    pub speedup_above: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            min_hz: 5.0,
            max_hz: 30.0,
            step_hz: 1.0,
            window_size: 10,
            backoff_below: 0.8,
            speedup_above: 0.9,
        }
    }
}

impl RateConfig {
    /// Clamp a rate into `[min_hz, max_hz]`
    ///
    /// Non-finite or non-positive input maps to `min_hz`.
    pub fn clamp(&self, rate_hz: f64) -> f64 {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return self.min_hz;
        }
        rate_hz.clamp(self.min_hz, self.max_hz)
    }
}

/// 遥测通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 遥测发布主题
    pub topic: String,

    /// 发布间隔 (毫秒)
    pub interval_ms: u64,

    /// 初始纬度
    pub seed_latitude: f64,

    /// 初始经度
    pub seed_longitude: f64,

    /// 高度 (米)
    pub altitude: f64,

    /// 每次发布的经纬度漂移量
    pub drift_per_tick: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            topic: "drone/gps".to_string(),
            interval_ms: 1000,
            seed_latitude: 28.604537463058893,
            seed_longitude: 77.36896549554069,
            altitude: 100.0,
            drift_per_tick: 0.00025,
        }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blueprint_defaults() {
        let bp = StreamBlueprint::default();
        assert_eq!(bp.transport.kind, TransportKind::Mqtt);
        assert_eq!(bp.transport.max_inflight, 20);
        assert_eq!(bp.video.topic, "test");
        assert_eq!(bp.video.buffer_capacity, 2);
        assert_eq!(bp.video.resolution(), Resolution::new(1280, 720));
        assert_eq!(bp.rate.window_size, 10);
        assert_eq!(bp.telemetry.topic, "drone/gps");
        assert_eq!(bp.telemetry.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = TransportConfig {
            host: "broker.local".to_string(),
            port: 8883,
            keepalive_secs: 30,
            ..Default::default()
        };
        let options = config.to_connect_options();
        assert_eq!(options.host, "broker.local");
        assert_eq!(options.port, 8883);
        assert_eq!(options.keepalive, Duration::from_secs(30));
        assert_eq!(options.max_payload_bytes, 10_485_760);
    }

    #[test]
    fn test_rate_clamp() {
        let rate = RateConfig::default();
        assert_eq!(rate.clamp(60.0), 30.0);
        assert_eq!(rate.clamp(1.0), 5.0);
        assert_eq!(rate.clamp(29.97), 29.97);
        assert_eq!(rate.clamp(0.0), 5.0);
        assert_eq!(rate.clamp(f64::NAN), 5.0);
        assert_eq!(rate.clamp(f64::INFINITY), 5.0);
    }

    #[test]
    fn test_source_config_tagging() {
        let json = r#"{ "kind": "image_sequence", "path": "frames", "fps": 25.0 }"#;
        let source: SourceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            source,
            SourceConfig::ImageSequence {
                path: PathBuf::from("frames"),
                fps: 25.0,
                loop_playback: false,
            }
        );
        assert_eq!(source.kind_name(), "image_sequence");
    }
}
