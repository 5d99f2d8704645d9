//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::StreamBlueprint;
use serde::Serialize;
use tracing::info;

use super::run::describe_source;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    transport: TransportInfo,
    video: VideoInfo,
    rate: RateInfo,
    telemetry: TelemetryInfo,
}

#[derive(Serialize)]
struct TransportInfo {
    kind: String,
    host: String,
    port: u16,
    client_id: String,
    keepalive_secs: u64,
    max_inflight: u16,
    max_payload_bytes: usize,
    qos: String,
}

#[derive(Serialize)]
struct VideoInfo {
    topic: String,
    resolution: String,
    jpeg_quality: u8,
    buffer_capacity: usize,
    source: String,
}

#[derive(Serialize)]
struct RateInfo {
    min_hz: f64,
    max_hz: f64,
    step_hz: f64,
    window_size: u32,
    backoff_below: f64,
    speedup_above: f64,
}

#[derive(Serialize)]
struct TelemetryInfo {
    topic: String,
    interval_ms: u64,
    seed: (f64, f64, f64),
    drift_per_tick: f64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else if args.toml {
        let toml = config_loader::ConfigLoader::to_toml(&blueprint)
            .context("Failed to serialize effective configuration")?;
        println!("{}", toml);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &StreamBlueprint) -> ConfigInfo {
    let transport = &blueprint.transport;
    let video = &blueprint.video;
    let rate = &blueprint.rate;
    let telemetry = &blueprint.telemetry;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        transport: TransportInfo {
            kind: format!("{:?}", transport.kind),
            host: transport.host.clone(),
            port: transport.port,
            client_id: transport.client_id.clone(),
            keepalive_secs: transport.keepalive_secs,
            max_inflight: transport.max_inflight,
            max_payload_bytes: transport.max_payload_bytes,
            qos: format!("{:?}", transport.qos),
        },
        video: VideoInfo {
            topic: video.topic.clone(),
            resolution: video.resolution().to_string(),
            jpeg_quality: video.jpeg_quality,
            buffer_capacity: video.buffer_capacity,
            source: describe_source(&video.source),
        },
        rate: RateInfo {
            min_hz: rate.min_hz,
            max_hz: rate.max_hz,
            step_hz: rate.step_hz,
            window_size: rate.window_size,
            backoff_below: rate.backoff_below,
            speedup_above: rate.speedup_above,
        },
        telemetry: TelemetryInfo {
            topic: telemetry.topic.clone(),
            interval_ms: telemetry.interval_ms,
            seed: (
                telemetry.seed_latitude,
                telemetry.seed_longitude,
                telemetry.altitude,
            ),
            drift_per_tick: telemetry.drift_per_tick,
        },
    }
}

fn print_config_info(blueprint: &StreamBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Adaptive Streamer Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let transport = &blueprint.transport;
    println!("📡 Transport");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Kind: {:?}", transport.kind);
    println!("   ├─ Broker: {}:{}", transport.host, transport.port);
    println!("   ├─ Client ID: {}", transport.client_id);
    println!("   ├─ Keepalive: {}s", transport.keepalive_secs);
    println!("   ├─ Max in-flight: {}", transport.max_inflight);
    println!("   ├─ Max payload: {} bytes", transport.max_payload_bytes);
    println!("   └─ QoS: {:?}", transport.qos);

    let video = &blueprint.video;
    println!("\n🎥 Video");
    println!("   ├─ Topic: {}", video.topic);
    println!("   ├─ Resolution: {}", video.resolution());
    println!("   ├─ JPEG quality: {}", video.jpeg_quality);
    println!("   ├─ Buffer capacity: {}", video.buffer_capacity);
    println!("   └─ Source: {}", describe_source(&video.source));

    let rate = &blueprint.rate;
    println!("\n⚙️  Rate Control");
    println!("   ├─ Range: {} - {} Hz", rate.min_hz, rate.max_hz);
    println!("   ├─ Step: {} Hz", rate.step_hz);
    println!("   ├─ Window: {} attempts", rate.window_size);
    println!(
        "   └─ Dead band: [{}, {}]",
        rate.backoff_below, rate.speedup_above
    );

    let telemetry = &blueprint.telemetry;
    println!("\n🛰  Telemetry");
    println!("   ├─ Topic: {}", telemetry.topic);
    println!("   ├─ Interval: {} ms", telemetry.interval_ms);
    println!(
        "   ├─ Seed: lat {}, lon {}, alt {}",
        telemetry.seed_latitude, telemetry.seed_longitude, telemetry.altitude
    );
    println!("   └─ Drift per tick: {}", telemetry.drift_per_tick);

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_info_json() {
        let info = build_config_info(&StreamBlueprint::default());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["transport"]["port"], 1883);
        assert_eq!(json["transport"]["max_inflight"], 20);
        assert_eq!(json["video"]["topic"], "test");
        assert_eq!(json["video"]["resolution"], "1280x720");
        assert_eq!(json["rate"]["window_size"], 10);
        assert_eq!(json["telemetry"]["topic"], "drone/gps");
    }
}
