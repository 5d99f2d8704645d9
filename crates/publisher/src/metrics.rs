//! Publisher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the publish loop, telemetry loop and supervisor
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    /// Frames accepted by the transport
    frames_published: AtomicU64,
    /// Synchronous submission failures on the video topic
    submit_failures: AtomicU64,
    /// Frames dropped because encoding failed
    encode_failures: AtomicU64,
    /// Successful video acknowledgements
    acks_succeeded: AtomicU64,
    /// Failed video acknowledgements
    acks_failed: AtomicU64,
    /// Telemetry reports accepted by the transport
    telemetry_published: AtomicU64,
    /// Telemetry reports rejected by the transport
    telemetry_failed: AtomicU64,
    /// Connection losses seen
    connection_losses: AtomicU64,
    /// Successful reconnects
    reconnects: AtomicU64,
    /// Failed reconnects
    reconnect_failures: AtomicU64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_frames_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_submit_failures(&self) {
        self.submit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_encode_failures(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ack(&self, success: bool) {
        if success {
            self.acks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.acks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_telemetry(&self, success: bool) {
        if success {
            self.telemetry_published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.telemetry_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_connection_losses(&self) {
        self.connection_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self, success: bool) {
        if success {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            acks_succeeded: self.acks_succeeded.load(Ordering::Relaxed),
            acks_failed: self.acks_failed.load(Ordering::Relaxed),
            telemetry_published: self.telemetry_published.load(Ordering::Relaxed),
            telemetry_failed: self.telemetry_failed.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            reconnect_failures: self.reconnect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of publisher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherMetricsSnapshot {
    pub frames_published: u64,
    pub submit_failures: u64,
    pub encode_failures: u64,
    pub acks_succeeded: u64,
    pub acks_failed: u64,
    pub telemetry_published: u64,
    pub telemetry_failed: u64,
    pub connection_losses: u64,
    pub reconnects: u64,
    pub reconnect_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = PublisherMetrics::new();
        metrics.inc_frames_published();
        metrics.inc_submit_failures();
        metrics.record_ack(true);
        metrics.record_ack(false);
        metrics.record_telemetry(true);
        metrics.record_reconnect(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_published, 1);
        assert_eq!(snapshot.submit_failures, 1);
        assert_eq!(snapshot.acks_succeeded, 1);
        assert_eq!(snapshot.acks_failed, 1);
        assert_eq!(snapshot.telemetry_published, 1);
        assert_eq!(snapshot.telemetry_failed, 0);
        assert_eq!(snapshot.reconnect_failures, 1);
    }
}
