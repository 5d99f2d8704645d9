//! Pipeline statistics and metrics.

use std::time::Duration;

use capture::CaptureMetricsSnapshot;
use observability::MetricsSummary;
use publisher::PublisherMetricsSnapshot;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Transport used for the run
    pub transport: String,

    /// Source that fed the capture loop
    pub source: String,

    /// Capture rate at start-up (source nominal rate, clamped)
    pub initial_rate_hz: f64,

    /// Capture rate when the publish loop stopped
    pub final_rate_hz: f64,

    /// How the capture loop ended
    pub capture_exit: String,

    /// Capture loop failed (source read or frame preparation)
    pub capture_failed: bool,

    /// How the publish loop ended
    pub publish_exit: String,

    /// Telemetry reports produced
    pub telemetry_ticks: u64,

    pub capture: CaptureMetricsSnapshot,
    pub publisher: PublisherMetricsSnapshot,

    /// Publish-side aggregates (attempts, windows, payload sizes)
    pub stream: MetricsSummary,
}

impl PipelineStats {
    /// Frames submitted per second of run time
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.publisher.frames_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of captured frames overwritten before publishing, as percentage
    pub fn eviction_rate(&self) -> f64 {
        if self.capture.frames_captured > 0 {
            (self.capture.frames_evicted as f64 / self.capture.frames_captured as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Streamer Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Transport: {}", self.transport);
        println!("   ├─ Source: {}", self.source);
        println!("   ├─ Capture exit: {}", self.capture_exit);
        println!("   ├─ Publish exit: {}", self.publish_exit);
        println!("   └─ Published FPS: {:.2}", self.fps());

        println!("\n🎥 Capture");
        println!("   ├─ Frames captured: {}", self.capture.frames_captured);
        println!(
            "   ├─ Frames evicted: {} ({:.2}%)",
            self.capture.frames_evicted,
            self.eviction_rate()
        );
        println!("   ├─ Frames resized: {}", self.capture.frames_resized);
        println!("   └─ Read errors: {}", self.capture.read_errors);

        println!("\n📤 Publish");
        println!("   ├─ Frames submitted: {}", self.publisher.frames_published);
        println!("   ├─ Submit failures: {}", self.publisher.submit_failures);
        println!("   ├─ Encode failures: {}", self.publisher.encode_failures);
        println!(
            "   ├─ Acks: {} ok / {} failed",
            self.publisher.acks_succeeded, self.publisher.acks_failed
        );
        println!(
            "   └─ Rate: {:.1} Hz -> {:.1} Hz",
            self.initial_rate_hz, self.final_rate_hz
        );

        println!("\n🛰  Telemetry");
        println!("   ├─ Ticks: {}", self.telemetry_ticks);
        println!(
            "   └─ Published: {} ok / {} failed",
            self.publisher.telemetry_published, self.publisher.telemetry_failed
        );

        if self.publisher.connection_losses > 0 {
            println!("\n⚠️  Connection");
            println!("   ├─ Losses: {}", self.publisher.connection_losses);
            println!("   ├─ Reconnects: {}", self.publisher.reconnects);
            println!(
                "   └─ Failed reconnects: {}",
                self.publisher.reconnect_failures
            );
        }

        println!("\n{}", self.stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_with_empty_run() {
        let stats = PipelineStats::default();
        assert_eq!(stats.fps(), 0.0);
        assert_eq!(stats.eviction_rate(), 0.0);
    }

    #[test]
    fn test_fps_and_eviction_rate() {
        let stats = PipelineStats {
            duration: Duration::from_secs(2),
            capture: CaptureMetricsSnapshot {
                frames_captured: 40,
                frames_evicted: 10,
                ..Default::default()
            },
            publisher: PublisherMetricsSnapshot {
                frames_published: 30,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(stats.fps(), 15.0);
        assert_eq!(stats.eviction_rate(), 25.0);
    }
}
