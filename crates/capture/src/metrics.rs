//! Capture metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Capture loop counters
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    /// Frames read from the source and queued
    pub frames_captured: AtomicU64,

    /// Frames overwritten in the buffer before being published
    pub frames_evicted: AtomicU64,

    /// Frames that needed a resize
    pub frames_resized: AtomicU64,

    /// Source read failures
    pub read_errors: AtomicU64,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.frames_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resized(&self) {
        self.frames_resized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> CaptureMetricsSnapshot {
        CaptureMetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_evicted: self.frames_evicted.load(Ordering::Relaxed),
            frames_resized: self.frames_resized.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureMetricsSnapshot {
    pub frames_captured: u64,
    pub frames_evicted: u64,
    pub frames_resized: u64,
    pub read_errors: u64,
}
