//! FrameSource trait - capture device / file abstraction
//!
//! Decouples CaptureLoop from concrete sources (image sequences, synthetic
//! patterns, devices).

use image::RgbImage;

use crate::ContractError;

/// Raw frame producer
///
/// Frames are pulled on demand; pacing is the caller's job.
#[trait_variant::make(FrameSource: Send)]
pub trait LocalFrameSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Nominal frame rate reported by the source, used as the initial capture rate
    fn nominal_rate_hz(&self) -> f64;

    /// Read the next frame
    ///
    /// Returns `Ok(None)` once the source has no more frames.
    ///
    /// # Errors
    /// Returns read error (device failure, undecodable file)
    async fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError>;

    /// Release the underlying device/file
    async fn release(&mut self);
}
