//! TelemetryLoop - periodic synthetic position reports
//!
//! Independent of the video path: publish failures are logged and the loop
//! keeps ticking until shutdown.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{TelemetryConfig, TelemetryReport, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::PublishError;
use crate::metrics::PublisherMetrics;

/// Drifting position generator
///
/// Tick `n` (starting at 1) reports `seed + n * drift` for latitude and
/// longitude; altitude stays at the seed.
#[derive(Debug, Clone)]
pub struct TelemetryGenerator {
    seed_latitude: f64,
    seed_longitude: f64,
    altitude: f64,
    drift_per_tick: f64,
    tick: u64,
}

impl TelemetryGenerator {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            seed_latitude: config.seed_latitude,
            seed_longitude: config.seed_longitude,
            altitude: config.altitude,
            drift_per_tick: config.drift_per_tick,
            tick: 0,
        }
    }

    /// Ticks produced so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Report for tick `n`
    pub fn report_at(&self, n: u64) -> TelemetryReport {
        let offset = n as f64 * self.drift_per_tick;
        TelemetryReport {
            latitude: self.seed_latitude + offset,
            longitude: self.seed_longitude + offset,
            altitude: self.altitude,
        }
    }

    /// Advance one tick and return its report
    pub fn next_report(&mut self) -> TelemetryReport {
        self.tick += 1;
        self.report_at(self.tick)
    }
}

/// Serialize a report as the flat `{"lat", "lon", "alt"}` object
pub fn encode_report(report: &TelemetryReport) -> Result<Bytes, PublishError> {
    Ok(Bytes::from(serde_json::to_vec(report)?))
}

/// Periodic telemetry publisher
pub struct TelemetryLoop<T> {
    transport: Arc<T>,
    topic: String,
    interval: Duration,
    generator: TelemetryGenerator,
    metrics: Arc<PublisherMetrics>,
}

impl<T> TelemetryLoop<T>
where
    T: Transport + Sync + 'static,
{
    pub fn new(transport: Arc<T>, config: &TelemetryConfig, metrics: Arc<PublisherMetrics>) -> Self {
        Self {
            transport,
            topic: config.topic.clone(),
            interval: config.interval(),
            generator: TelemetryGenerator::new(config),
            metrics,
        }
    }

    /// Publish one report per interval until `cancel` fires
    ///
    /// Returns the number of ticks produced.
    #[instrument(name = "telemetry_loop", skip_all, fields(topic = %self.topic))]
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        info!(interval_ms = self.interval.as_millis() as u64, "telemetry loop started");

        loop {
            let report = self.generator.next_report();
            let tick = self.generator.tick();

            match encode_report(&report) {
                Ok(payload) => {
                    let result = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = self.transport.publish(&self.topic, payload) => result,
                    };
                    match result {
                        Ok(()) => {
                            debug!(
                                tick,
                                lat = report.latitude,
                                lon = report.longitude,
                                alt = report.altitude,
                                "telemetry published"
                            );
                            self.metrics.record_telemetry(true);
                            observability::record_telemetry_published(true);
                        }
                        Err(e) => {
                            warn!(tick, error = %e, "telemetry publish failed");
                            self.metrics.record_telemetry(false);
                            observability::record_telemetry_published(false);
                        }
                    }
                }
                Err(e) => warn!(tick, error = %e, "telemetry report skipped"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(ticks = self.generator.tick(), "telemetry loop stopped");
        self.generator.tick()
    }
}
