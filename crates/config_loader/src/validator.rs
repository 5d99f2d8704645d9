//! 配置校验模块
//!
//! 校验规则：
//! - 主题非空且互不相同
//! - 传输参数 (port / max_inflight / max_payload_bytes) > 0
//! - 视频分辨率、JPEG 质量、缓冲容量合法
//! - 0 < min_hz <= max_hz, step_hz > 0, window_size > 0
//! - 0 <= backoff_below <= speedup_above <= 1
//! - 遥测间隔 > 0
//! - 视频源参数合法

use contracts::{ContractError, SourceConfig, StreamBlueprint};

/// 校验 StreamBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    validate_topics(blueprint)?;
    validate_transport(blueprint)?;
    validate_video(blueprint)?;
    validate_source(&blueprint.video.source)?;
    validate_rate(blueprint)?;
    validate_telemetry(blueprint)?;
    Ok(())
}

/// 校验主题
fn validate_topics(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    if blueprint.video.topic.trim().is_empty() {
        return Err(ContractError::config_validation(
            "video.topic",
            "topic cannot be empty",
        ));
    }
    if blueprint.telemetry.topic.trim().is_empty() {
        return Err(ContractError::config_validation(
            "telemetry.topic",
            "topic cannot be empty",
        ));
    }
    if blueprint.video.topic == blueprint.telemetry.topic {
        return Err(ContractError::config_validation(
            "telemetry.topic",
            format!(
                "telemetry topic must differ from video topic '{}'",
                blueprint.video.topic
            ),
        ));
    }
    Ok(())
}

/// 校验传输层配置
fn validate_transport(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let transport = &blueprint.transport;

    if transport.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "transport.host",
            "host cannot be empty",
        ));
    }
    if transport.port == 0 {
        return Err(ContractError::config_validation(
            "transport.port",
            "port must be > 0",
        ));
    }
    if transport.max_inflight == 0 {
        return Err(ContractError::config_validation(
            "transport.max_inflight",
            "max_inflight must be > 0",
        ));
    }
    if transport.max_payload_bytes == 0 {
        return Err(ContractError::config_validation(
            "transport.max_payload_bytes",
            "max_payload_bytes must be > 0",
        ));
    }
    Ok(())
}

/// 校验视频通道配置
fn validate_video(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let video = &blueprint.video;

    if video.width == 0 || video.height == 0 {
        return Err(ContractError::config_validation(
            "video.width / video.height",
            format!(
                "resolution must be non-zero, got {}x{}",
                video.width, video.height
            ),
        ));
    }
    if !(1..=100).contains(&video.jpeg_quality) {
        return Err(ContractError::config_validation(
            "video.jpeg_quality",
            format!("jpeg_quality must be in 1..=100, got {}", video.jpeg_quality),
        ));
    }
    if video.buffer_capacity == 0 {
        return Err(ContractError::config_validation(
            "video.buffer_capacity",
            "buffer_capacity must be >= 1",
        ));
    }
    Ok(())
}

/// 校验视频源配置
fn validate_source(source: &SourceConfig) -> Result<(), ContractError> {
    match source {
        SourceConfig::ImageSequence { path, fps, .. } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "video.source.path",
                    "path cannot be empty",
                ));
            }
            validate_fps(*fps)
        }
        SourceConfig::Synthetic {
            fps,
            width,
            height,
            max_frames,
        } => {
            if *width == 0 || *height == 0 {
                return Err(ContractError::config_validation(
                    "video.source.width / video.source.height",
                    "synthetic resolution must be non-zero",
                ));
            }
            if *max_frames == Some(0) {
                return Err(ContractError::config_validation(
                    "video.source.max_frames",
                    "max_frames must be > 0 when set",
                ));
            }
            validate_fps(*fps)
        }
        SourceConfig::VideoFile { path } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "video.source.path",
                    "path cannot be empty",
                ));
            }
            Ok(())
        }
        SourceConfig::VideoDevice { format, input } => {
            if format.trim().is_empty() || input.trim().is_empty() {
                return Err(ContractError::config_validation(
                    "video.source.format / video.source.input",
                    "device format and input cannot be empty",
                ));
            }
            Ok(())
        }
    }
}

fn validate_fps(fps: f64) -> Result<(), ContractError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ContractError::config_validation(
            "video.source.fps",
            format!("fps must be > 0, got {}", fps),
        ));
    }
    Ok(())
}

/// 校验速率自适应配置
fn validate_rate(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let rate = &blueprint.rate;

    if !(rate.min_hz > 0.0) {
        return Err(ContractError::config_validation(
            "rate.min_hz",
            format!("min_hz must be > 0, got {}", rate.min_hz),
        ));
    }
    if rate.min_hz > rate.max_hz {
        return Err(ContractError::config_validation(
            "rate.min_hz / rate.max_hz",
            format!(
                "min_hz ({}) must be <= max_hz ({})",
                rate.min_hz, rate.max_hz
            ),
        ));
    }
    if !(rate.step_hz > 0.0) {
        return Err(ContractError::config_validation(
            "rate.step_hz",
            format!("step_hz must be > 0, got {}", rate.step_hz),
        ));
    }
    if rate.window_size == 0 {
        return Err(ContractError::config_validation(
            "rate.window_size",
            "window_size must be > 0",
        ));
    }
    let in_unit = |v: f64| (0.0..=1.0).contains(&v);
    if !in_unit(rate.backoff_below) || !in_unit(rate.speedup_above) {
        return Err(ContractError::config_validation(
            "rate.backoff_below / rate.speedup_above",
            "thresholds must be within [0, 1]",
        ));
    }
    if rate.backoff_below > rate.speedup_above {
        return Err(ContractError::config_validation(
            "rate.backoff_below / rate.speedup_above",
            format!(
                "backoff_below ({}) must be <= speedup_above ({})",
                rate.backoff_below, rate.speedup_above
            ),
        ));
    }
    Ok(())
}

/// 校验遥测配置
fn validate_telemetry(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let telemetry = &blueprint.telemetry;

    if telemetry.interval_ms == 0 {
        return Err(ContractError::config_validation(
            "telemetry.interval_ms",
            "interval_ms must be > 0",
        ));
    }
    let coords = [
        telemetry.seed_latitude,
        telemetry.seed_longitude,
        telemetry.altitude,
        telemetry.drift_per_tick,
    ];
    if coords.iter().any(|v| !v.is_finite()) {
        return Err(ContractError::config_validation(
            "telemetry",
            "seed coordinates and drift must be finite",
        ));
    }
    Ok(())
}
