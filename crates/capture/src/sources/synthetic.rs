//! Synthetic test pattern source
//!
//! Generates a moving gradient. Used for demos and tests without a camera or
//! image directory.

use contracts::{ContractError, FrameSource};
use image::{Rgb, RgbImage};
use tracing::debug;

/// Synthetic frame source
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    max_frames: Option<u64>,
    produced: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            max_frames: None,
            produced: 0,
        }
    }

    /// Stop after `max_frames` frames
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Frames produced so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Render pattern number `index`
    pub fn render(width: u32, height: u32, index: u64) -> RgbImage {
        let shift = (index % 256) as u32;
        RgbImage::from_fn(width, height, |x, y| {
            let r = ((x * 255) / width.max(1) + shift) % 256;
            let g = ((y * 255) / height.max(1) + shift) % 256;
            let b = (shift * 3) % 256;
            Rgb([r as u8, g as u8, b as u8])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn nominal_rate_hz(&self) -> f64 {
        self.fps
    }

    async fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        if self.max_frames.is_some_and(|max| self.produced >= max) {
            return Ok(None);
        }
        let image = Self::render(self.width, self.height, self.produced);
        self.produced += 1;
        Ok(Some(image))
    }

    async fn release(&mut self) {
        debug!(produced = self.produced, "synthetic source released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_max_frames() {
        let mut source = SyntheticSource::new(4, 4, 10.0).with_max_frames(3);
        for _ in 0..3 {
            assert!(source.read_frame().await.unwrap().is_some());
        }
        assert!(source.read_frame().await.unwrap().is_none());
        assert!(source.read_frame().await.unwrap().is_none());
        assert_eq!(source.produced(), 3);
    }

    #[tokio::test]
    async fn test_unbounded_and_sized() {
        let mut source = SyntheticSource::new(32, 18, 25.0);
        assert_eq!(source.nominal_rate_hz(), 25.0);
        for _ in 0..10 {
            let image = source.read_frame().await.unwrap().unwrap();
            assert_eq!(image.dimensions(), (32, 18));
        }
    }

    #[test]
    fn test_pattern_moves() {
        let a = SyntheticSource::render(8, 8, 0);
        let b = SyntheticSource::render(8, 8, 1);
        assert_ne!(a, b);
    }
}
