//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{SourceConfig, StreamBlueprint};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_streamer(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after command-line overrides")?;

    info!(
        transport = ?blueprint.transport.kind,
        host = %blueprint.transport.host,
        port = blueprint.transport.port,
        source = blueprint.video.source.kind_name(),
        video_topic = %blueprint.video.topic,
        telemetry_topic = %blueprint.telemetry.topic,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        duration: if args.duration == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Ctrl+C / SIGTERM cancel the token, every loop drains and stops
    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(shutdown.clone()));

    info!("Starting streamer...");
    let result = pipeline.run(shutdown).await;
    signal_task.abort();

    let stats = result.context("Streamer execution failed")?;
    info!(
        frames_published = stats.publisher.frames_published,
        frames_evicted = stats.capture.frames_evicted,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Streamer finished"
    );
    stats.print_summary();

    if stats.capture_failed {
        anyhow::bail!("Video source failed: {}", stats.capture_exit);
    }
    Ok(())
}

/// Apply command-line / environment overrides on top of the file
fn apply_overrides(blueprint: &mut StreamBlueprint, args: &RunArgs) {
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding broker host from CLI");
        blueprint.transport.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding broker port from CLI");
        blueprint.transport.port = port;
    }
    if let Some(kind) = args.transport {
        info!(transport = ?kind, "Overriding transport from CLI");
        blueprint.transport.kind = kind.into();
    }
    if let Some(ref source_path) = args.source_path {
        info!(path = %source_path.display(), "Overriding source path from CLI");
        override_source_path(&mut blueprint.video.source, source_path.clone());
    }
}

/// Point the source at a new path
///
/// A synthetic source becomes a video file when the path has an extension,
/// otherwise an image sequence at the same fps.
fn override_source_path(source: &mut SourceConfig, new_path: PathBuf) {
    match source {
        SourceConfig::ImageSequence { path, .. } | SourceConfig::VideoFile { path } => {
            *path = new_path
        }
        SourceConfig::VideoDevice { input, .. } => *input = new_path.display().to_string(),
        SourceConfig::Synthetic { fps, .. } => {
            if new_path.is_dir() || new_path.extension().is_none() {
                warn!("Replacing synthetic source with image sequence");
                *source = SourceConfig::ImageSequence {
                    path: new_path,
                    fps: *fps,
                    loop_playback: false,
                };
            } else {
                warn!("Replacing synthetic source with video file");
                *source = SourceConfig::VideoFile { path: new_path };
            }
        }
    }
}

/// Resolve once Ctrl+C or SIGTERM is received, then cancel `token`
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping streamer...");
    token.cancel();
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &StreamBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Transport:");
    println!("  Kind: {:?}", blueprint.transport.kind);
    println!(
        "  Broker: {}:{}",
        blueprint.transport.host, blueprint.transport.port
    );
    println!("  QoS: {:?}", blueprint.transport.qos);

    println!("\nVideo:");
    println!("  Topic: {}", blueprint.video.topic);
    println!("  Resolution: {}", blueprint.video.resolution());
    println!("  Source: {}", describe_source(&blueprint.video.source));

    println!("\nRate:");
    println!(
        "  {} - {} Hz, step {} Hz, window {}",
        blueprint.rate.min_hz, blueprint.rate.max_hz, blueprint.rate.step_hz, blueprint.rate.window_size
    );

    println!("\nTelemetry:");
    println!(
        "  Topic: {} every {} ms",
        blueprint.telemetry.topic, blueprint.telemetry.interval_ms
    );

    println!();
}

pub(crate) fn describe_source(source: &SourceConfig) -> String {
    match source {
        SourceConfig::ImageSequence {
            path,
            fps,
            loop_playback,
        } => format!(
            "image sequence {} @ {} fps{}",
            path.display(),
            fps,
            if *loop_playback { " (looping)" } else { "" }
        ),
        SourceConfig::Synthetic {
            fps,
            width,
            height,
            max_frames,
        } => match max_frames {
            Some(max) => format!("synthetic {width}x{height} @ {fps} fps, {max} frames"),
            None => format!("synthetic {width}x{height} @ {fps} fps"),
        },
        SourceConfig::VideoFile { path } => format!("video file {}", path.display()),
        SourceConfig::VideoDevice { format, input } => format!("{format} device {input}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TransportArg;
    use contracts::TransportKind;

    fn args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("streamer.toml"),
            host: None,
            port: None,
            source_path: None,
            transport: None,
            duration: 0,
            dry_run: false,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut blueprint = StreamBlueprint::default();
        let args = RunArgs {
            host: Some("broker.lan".into()),
            port: Some(1884),
            transport: Some(TransportArg::Memory),
            ..args()
        };
        apply_overrides(&mut blueprint, &args);
        assert_eq!(blueprint.transport.host, "broker.lan");
        assert_eq!(blueprint.transport.port, 1884);
        assert_eq!(blueprint.transport.kind, TransportKind::Memory);
    }

    #[test]
    fn test_source_path_replaces_synthetic() {
        let mut source = SourceConfig::Synthetic {
            fps: 12.0,
            width: 64,
            height: 48,
            max_frames: None,
        };
        override_source_path(&mut source, PathBuf::from("frames"));
        assert_eq!(
            source,
            SourceConfig::ImageSequence {
                path: PathBuf::from("frames"),
                fps: 12.0,
                loop_playback: false,
            }
        );
    }

    #[test]
    fn test_source_path_keeps_image_sequence_settings() {
        let mut source = SourceConfig::ImageSequence {
            path: PathBuf::from("old"),
            fps: 25.0,
            loop_playback: true,
        };
        override_source_path(&mut source, PathBuf::from("new"));
        assert_eq!(
            source,
            SourceConfig::ImageSequence {
                path: PathBuf::from("new"),
                fps: 25.0,
                loop_playback: true,
            }
        );
    }

    #[test]
    fn test_source_path_with_extension_selects_video_file() {
        let mut source = SourceConfig::default();
        override_source_path(&mut source, PathBuf::from("test.mp4"));
        assert_eq!(
            source,
            SourceConfig::VideoFile {
                path: PathBuf::from("test.mp4")
            }
        );
        assert_eq!(describe_source(&source), "video file test.mp4");

        let mut device = SourceConfig::VideoDevice {
            format: "v4l2".to_string(),
            input: "/dev/video0".to_string(),
        };
        override_source_path(&mut device, PathBuf::from("/dev/video2"));
        assert_eq!(describe_source(&device), "v4l2 device /dev/video2");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamer.toml");
        std::fs::write(&path, "[transport]\nkind = \"memory\"\n").unwrap();
        let args = RunArgs {
            config: path,
            dry_run: true,
            ..args()
        };
        run_streamer(&args).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_config_fails() {
        let args = RunArgs {
            config: PathBuf::from("/nonexistent/streamer.toml"),
            ..args()
        };
        assert!(run_streamer(&args).await.is_err());
    }
}
