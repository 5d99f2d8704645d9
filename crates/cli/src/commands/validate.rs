//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SourceConfig, StreamBlueprint, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    transport: String,
    broker: String,
    source: String,
    video_topic: String,
    telemetry_topic: String,
    rate_range_hz: (f64, f64),
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    transport: format!("{:?}", blueprint.transport.kind),
                    broker: format!("{}:{}", blueprint.transport.host, blueprint.transport.port),
                    source: blueprint.video.source.kind_name().to_string(),
                    video_topic: blueprint.video.topic.clone(),
                    telemetry_topic: blueprint.telemetry.topic.clone(),
                    rate_range_hz: (blueprint.rate.min_hz, blueprint.rate.max_hz),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &StreamBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.transport.kind == TransportKind::Memory {
        warnings.push("transport.kind is 'memory' - nothing is sent to a broker".to_string());
    }

    let fps = match &blueprint.video.source {
        SourceConfig::ImageSequence { path, fps, .. } => {
            if !path.is_dir() {
                warnings.push(format!(
                    "video.source.path '{}' is not a directory (yet)",
                    path.display()
                ));
            }
            Some(*fps)
        }
        SourceConfig::Synthetic { fps, .. } => {
            warnings.push("video.source is a synthetic test pattern".to_string());
            Some(*fps)
        }
        SourceConfig::VideoFile { path } => {
            if !path.is_file() {
                warnings.push(format!(
                    "video.source.path '{}' is not a file (yet)",
                    path.display()
                ));
            }
            None
        }
        // Frame rate is only known once the input is opened
        SourceConfig::VideoDevice { .. } => None,
    };

    let rate = &blueprint.rate;
    if let Some(fps) = fps.filter(|fps| *fps < rate.min_hz || *fps > rate.max_hz) {
        warnings.push(format!(
            "source fps {} is outside [{}, {}] Hz and will be clamped",
            fps, rate.min_hz, rate.max_hz
        ));
    }

    if blueprint.video.buffer_capacity > 8 {
        warnings.push(format!(
            "video.buffer_capacity {} adds latency under congestion",
            blueprint.video.buffer_capacity
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Transport: {} ({})", summary.transport, summary.broker);
            println!("  Source: {}", summary.source);
            println!("  Video topic: {}", summary.video_topic);
            println!("  Telemetry topic: {}", summary.telemetry_topic);
            println!(
                "  Rate range: {} - {} Hz",
                summary.rate_range_hz.0, summary.rate_range_hz.1
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
