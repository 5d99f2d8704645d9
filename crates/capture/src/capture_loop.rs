//! CaptureLoop - paced frame producer
//!
//! Reads one frame per pacing interval, resizes it to the target resolution
//! and pushes it into the frame buffer.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Frame, FrameSource, Resolution};
use image::imageops::{self, FilterType};
use image::RgbImage;
use rate_control::PacingReceiver;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::buffer::FrameWriter;
use crate::error::{CaptureError, Result};
use crate::metrics::CaptureMetrics;

/// Capture loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Running,
    /// Terminal
    Stopped,
}

/// Why the capture loop stopped
#[derive(Debug)]
pub enum CaptureExit {
    /// Source reported no more frames
    SourceExhausted,
    /// Source read (or frame preparation) failed
    Failed(CaptureError),
    /// Shutdown requested
    Cancelled,
}

impl CaptureExit {
    /// Whether the process should report failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Paced producer feeding the frame buffer
pub struct CaptureLoop<S> {
    source: S,
    writer: FrameWriter,
    pacing: PacingReceiver,
    target: Resolution,
    metrics: Arc<CaptureMetrics>,
    state: CaptureState,
    next_seq: u64,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        writer: FrameWriter,
        pacing: PacingReceiver,
        target: Resolution,
    ) -> Self {
        Self {
            source,
            writer,
            pacing,
            target,
            metrics: Arc::new(CaptureMetrics::new()),
            state: CaptureState::Running,
            next_seq: 0,
        }
    }

    /// Share metrics with another owner (e.g. the run summary)
    pub fn with_metrics(mut self, metrics: Arc<CaptureMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<CaptureMetrics> {
        self.metrics.clone()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Run until the source ends, fails, or `cancel` fires
    ///
    /// The source is always released and the buffer always closed on return.
    #[instrument(name = "capture_loop", skip_all, fields(source = %self.source.name(), target = %self.target))]
    pub async fn run(mut self, cancel: CancellationToken) -> CaptureExit {
        let started = Instant::now();
        let mut last_capture = started;
        info!(rate_hz = self.pacing.rate_hz(), "capture loop started");

        let exit = loop {
            let deadline = last_capture + self.pacing.interval();
            tokio::select! {
                _ = cancel.cancelled() => break CaptureExit::Cancelled,
                _ = self.pacing.changed() => {
                    trace!(rate_hz = self.pacing.rate_hz(), "pacing changed, deadline recomputed");
                    continue;
                }
                _ = sleep_until(deadline) => {}
            }

            let tick = Instant::now();
            let read = tokio::select! {
                _ = cancel.cancelled() => break CaptureExit::Cancelled,
                read = self.source.read_frame() => read,
            };

            match read {
                Ok(Some(image)) => {
                    if let Err(e) = self.enqueue(image, tick - started).await {
                        error!(error = %e, "failed to queue frame");
                        break CaptureExit::Failed(e);
                    }
                    last_capture = tick;
                }
                Ok(None) => {
                    info!(frames = self.next_seq, "frame source exhausted");
                    break CaptureExit::SourceExhausted;
                }
                Err(e) => {
                    self.metrics.record_read_error();
                    error!(error = %e, "failed to read frame");
                    break CaptureExit::Failed(e.into());
                }
            }
        };

        self.state = CaptureState::Stopped;
        self.source.release().await;
        self.writer.close();
        info!(exit = ?exit, metrics = ?self.metrics.snapshot(), "capture loop stopped");
        exit
    }

    async fn enqueue(&mut self, image: RgbImage, captured_at: Duration) -> Result<()> {
        let frame_seq = self.next_seq;
        let image = self.normalize(image, frame_seq).await?;
        self.next_seq += 1;

        let frame = Frame::new(frame_seq, captured_at, image);
        let evicted = self
            .writer
            .put(frame)
            .map_err(|_| CaptureError::BufferClosed { frame_seq })?;

        if let Some(evicted_seq) = evicted {
            debug!(frame_seq, evicted_seq, "buffer full, oldest frame evicted");
            self.metrics.record_evicted();
            observability::record_frame_evicted();
        }
        self.metrics.record_captured();
        observability::record_frame_captured(self.source.name());
        observability::record_buffer_depth(self.writer.len());
        trace!(frame_seq, "frame queued");
        Ok(())
    }

    /// Resize to the target resolution, skipped when already there
    async fn normalize(&self, image: RgbImage, frame_seq: u64) -> Result<RgbImage> {
        let target = self.target;
        if image.width() == target.width && image.height() == target.height {
            return Ok(image);
        }

        self.metrics.record_resized();
        tokio::task::spawn_blocking(move || {
            imageops::resize(&image, target.width, target.height, FilterType::Triangle)
        })
        .await
        .map_err(|e| CaptureError::Resize {
            frame_seq,
            message: e.to_string(),
        })
    }
}
