//! PublishLoop - drains the frame buffer, encodes and publishes
//!
//! Every submission attempt is counted in the rate window; when a window
//! closes the rate controller adjusts the capture rate.

use std::sync::Arc;

use bytes::Bytes;
use capture::FrameReader;
use contracts::{Frame, Transport};
use observability::{MetricsSummary, StreamMetricsAggregator};
use rate_control::{RateController, RateWindow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::codec::FrameEncoder;
use crate::error::PublishError;
use crate::metrics::PublisherMetrics;

/// Why the publish loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishExit {
    /// Buffer closed by the producer and fully drained
    SourceEnded,
    /// Shutdown requested
    Cancelled,
}

/// Result of a publish loop run
#[derive(Debug, Clone)]
pub struct PublishSummary {
    pub exit: PublishExit,
    /// Capture rate when the loop stopped
    pub final_rate_hz: f64,
    pub stats: MetricsSummary,
}

/// Consumer side of the video path
pub struct PublishLoop<T, E> {
    transport: Arc<T>,
    encoder: Arc<E>,
    reader: FrameReader,
    topic: String,
    window: Arc<RateWindow>,
    controller: RateController,
    metrics: Arc<PublisherMetrics>,
    stats: StreamMetricsAggregator,
}

impl<T, E> PublishLoop<T, E>
where
    T: Transport + Sync + 'static,
    E: FrameEncoder,
{
    pub fn new(
        transport: Arc<T>,
        encoder: E,
        reader: FrameReader,
        topic: impl Into<String>,
        window: Arc<RateWindow>,
        controller: RateController,
        metrics: Arc<PublisherMetrics>,
    ) -> Self {
        Self {
            transport,
            encoder: Arc::new(encoder),
            reader,
            topic: topic.into(),
            window,
            controller,
            metrics,
            stats: StreamMetricsAggregator::new(),
        }
    }

    /// Run until the buffer ends or `cancel` fires
    #[instrument(
        name = "publish_loop",
        skip_all,
        fields(topic = %self.topic, codec = %self.encoder.name())
    )]
    pub async fn run(mut self, cancel: CancellationToken) -> PublishSummary {
        info!(rate_hz = self.controller.current_hz(), "publish loop started");

        let exit = loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break PublishExit::Cancelled,
                frame = self.reader.get() => match frame {
                    Some(frame) => frame,
                    None => break PublishExit::SourceEnded,
                },
            };
            let frame_seq = frame.seq;

            let payload = match self.encode(frame).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(frame_seq, error = %e, "encode failed, frame dropped");
                    self.metrics.inc_encode_failures();
                    self.stats.record_encode_failure();
                    observability::record_encode_failure();
                    continue;
                }
            };
            let size = payload.len();

            let result = tokio::select! {
                _ = cancel.cancelled() => break PublishExit::Cancelled,
                result = self.transport.publish(&self.topic, payload) => result,
            };
            let accepted = match result {
                Ok(()) => {
                    debug!(frame_seq, bytes = size, "frame submitted");
                    self.metrics.inc_frames_published();
                    observability::record_payload_size(size);
                    true
                }
                Err(e) => {
                    warn!(frame_seq, error = %e, "publish failed");
                    self.metrics.inc_submit_failures();
                    false
                }
            };
            observability::record_publish_attempt(&self.topic, accepted);
            self.stats.record_attempt(accepted, size);

            if let Some(summary) = self.window.record_attempt() {
                let decision = self.controller.on_window(summary);
                self.stats
                    .record_window(summary.ratio(), decision.previous_hz(), decision.rate_hz());
            }
        };

        let summary = PublishSummary {
            exit,
            final_rate_hz: self.controller.current_hz(),
            stats: self.stats.summary(),
        };
        info!(
            exit = ?summary.exit,
            final_rate_hz = summary.final_rate_hz,
            attempts = summary.stats.total_attempts,
            "publish loop stopped"
        );
        summary
    }

    /// Encode on the blocking pool
    async fn encode(&self, frame: Frame) -> Result<Bytes, PublishError> {
        let frame_seq = frame.seq;
        let encoder = self.encoder.clone();
        let payload = tokio::task::spawn_blocking(move || encoder.encode(&frame))
            .await
            .map_err(|e| PublishError::encode_task(frame_seq, e.to_string()))??;
        Ok(payload)
    }
}
