//! Pipeline orchestrator - coordinates all components.
//!
//! The transport is chosen by configuration: `memory` runs fully in-process,
//! `mqtt` needs the `mqtt` feature and a reachable broker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{frame_buffer, CaptureExit, CaptureLoop, CaptureMetrics, ConfiguredSource};
use contracts::{FrameSource, StreamBlueprint, Transport, TransportKind};
use publisher::transports::MemoryTransport;
use publisher::{
    ConnectionSupervisor, JpegEncoder, PublishLoop, PublisherMetrics, TelemetryLoop,
};
use rate_control::{pacing_channel, RateController, RateWindow};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::PipelineStats;

/// How long to wait for background tasks after the stop signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The stream blueprint configuration
    pub blueprint: StreamBlueprint,

    /// Stop after this long (None = until the source ends)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the source ends, the duration elapses or
    /// `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            let addr = observability::serve_metrics(port)?;
            info!("Metrics endpoint available on http://{}/metrics", addr);
        }

        match self.config.blueprint.transport.kind {
            TransportKind::Memory => {
                info!("Running with in-memory transport (nothing leaves this process)");
                self.run_with_transport(Arc::new(MemoryTransport::new()), shutdown)
                    .await
            }
            TransportKind::Mqtt => self.run_mqtt(shutdown).await,
        }
    }

    #[cfg(feature = "mqtt")]
    async fn run_mqtt(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        use publisher::transports::MqttTransport;

        self.run_with_transport(Arc::new(MqttTransport::new()), shutdown)
            .await
    }

    #[cfg(not(feature = "mqtt"))]
    async fn run_mqtt(self, _shutdown: CancellationToken) -> Result<PipelineStats> {
        anyhow::bail!("transport kind 'mqtt' requires building with the `mqtt` feature")
    }

    /// Wire and run every loop on top of `transport`
    pub(crate) async fn run_with_transport<T>(
        self,
        transport: Arc<T>,
        shutdown: CancellationToken,
    ) -> Result<PipelineStats>
    where
        T: Transport + Sync + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Open the video source
        let source = ConfiguredSource::from_config(&blueprint.video.source)
            .context("Failed to open video source")?;
        let source_name = source.name().to_string();
        info!(
            source = %source_name,
            nominal_hz = source.nominal_rate_hz(),
            "Video source opened"
        );

        // Register event handling before connecting so the first ConnAck is seen
        let window = Arc::new(RateWindow::new(blueprint.rate.window_size));
        let publisher_metrics = Arc::new(PublisherMetrics::new());
        let supervisor = ConnectionSupervisor::attach(
            transport.clone(),
            blueprint.video.topic.clone(),
            window.clone(),
            publisher_metrics.clone(),
        );

        let options = blueprint.transport.to_connect_options();
        info!(
            transport = %transport.name(),
            host = %options.host,
            port = options.port,
            "Connecting to broker..."
        );
        transport.connect(&options).await.with_context(|| {
            format!(
                "Failed to connect to broker at {}:{}",
                options.host, options.port
            )
        })?;

        // Rate control: start from the source's nominal rate
        let (pacing_tx, pacing_rx) = pacing_channel(source.nominal_rate_hz());
        let controller = RateController::new(blueprint.rate.clone(), pacing_tx);
        let initial_rate_hz = controller.current_hz();

        let (writer, reader) = frame_buffer(blueprint.video.buffer_capacity);
        let capture_metrics = Arc::new(CaptureMetrics::new());

        let capture = CaptureLoop::new(source, writer, pacing_rx, blueprint.video.resolution())
            .with_metrics(capture_metrics.clone());
        let publish = PublishLoop::new(
            transport.clone(),
            JpegEncoder::new(blueprint.video.jpeg_quality),
            reader,
            blueprint.video.topic.clone(),
            window,
            controller,
            publisher_metrics.clone(),
        );
        let telemetry =
            TelemetryLoop::new(transport.clone(), &blueprint.telemetry, publisher_metrics.clone());

        // Child token: shutdown stops everything, the pipeline can also stop itself
        let stop = shutdown.child_token();
        let capture_task = tokio::spawn(capture.run(stop.clone()));
        let mut publish_task = tokio::spawn(publish.run(stop.clone()));
        let telemetry_task = tokio::spawn(telemetry.run(stop.clone()));
        let supervisor_task = tokio::spawn(supervisor.run(stop.clone()));

        info!(
            video_topic = %blueprint.video.topic,
            telemetry_topic = %blueprint.telemetry.topic,
            rate_hz = initial_rate_hz,
            duration = ?self.config.duration,
            "Pipeline running"
        );

        let deadline = self.config.duration;
        let publish_result = tokio::select! {
            result = &mut publish_task => result,
            _ = sleep_or_pending(deadline) => {
                info!("Run duration reached");
                stop.cancel();
                (&mut publish_task).await
            }
            _ = stop.cancelled() => {
                warn!("Shutdown requested, stopping pipeline...");
                (&mut publish_task).await
            }
        };

        // Shutdown: stop and join everything before any join error is reported
        info!("Shutting down pipeline...");
        stop.cancel();

        let capture_result = capture_task.await;
        let telemetry_result = match tokio::time::timeout(SHUTDOWN_GRACE, telemetry_task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Telemetry loop did not stop in time");
                Ok(0)
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, supervisor_task).await.is_err() {
            warn!("Connection supervisor did not stop in time");
        }

        if let Err(e) = transport.disconnect().await {
            warn!(error = %e, "Error during disconnect");
        }

        let publish_summary = publish_result.context("Publish task panicked")?;
        let capture_exit = capture_result.context("Capture task panicked")?;
        let telemetry_ticks = telemetry_result.context("Telemetry task panicked")?;

        let capture_failed = capture_exit.is_failure();
        if let CaptureExit::Failed(ref e) = capture_exit {
            error!(error = %e, "Capture loop failed");
        }

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            transport: transport.name().to_string(),
            source: source_name,
            initial_rate_hz,
            final_rate_hz: publish_summary.final_rate_hz,
            capture_exit: describe_capture_exit(&capture_exit),
            capture_failed,
            publish_exit: format!("{:?}", publish_summary.exit),
            telemetry_ticks,
            capture: capture_metrics.snapshot(),
            publisher: publisher_metrics.snapshot(),
            stream: publish_summary.stats,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            final_rate_hz = stats.final_rate_hz,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

async fn sleep_or_pending(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

fn describe_capture_exit(exit: &CaptureExit) -> String {
    match exit {
        CaptureExit::SourceExhausted => "source exhausted".to_string(),
        CaptureExit::Failed(e) => format!("failed: {e}"),
        CaptureExit::Cancelled => "cancelled".to_string(),
    }
}
