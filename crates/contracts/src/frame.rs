//! Frame - CaptureLoop output
//!
//! A captured raster image travelling capture -> buffer -> publish.

use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Canonical width every frame is resized to before queueing
pub const CANONICAL_WIDTH: u32 = 1280;

/// Canonical height every frame is resized to before queueing
pub const CANONICAL_HEIGHT: u32 = 720;

/// Frame resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(CANONICAL_WIDTH, CANONICAL_HEIGHT)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Captured video frame
///
/// Owned by exactly one stage at a time; moved, never shared.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number (strictly increasing)
    pub seq: u64,

    /// Capture time, offset from stream start
    pub captured_at: Duration,

    /// RGB8 pixel data
    pub image: RgbImage,
}

impl Frame {
    /// Create a new frame
    pub fn new(seq: u64, captured_at: Duration, image: RgbImage) -> Self {
        Self {
            seq,
            captured_at,
            image,
        }
    }

    /// Frame resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}
