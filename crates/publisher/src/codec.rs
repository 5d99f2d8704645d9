//! Frame codec
//!
//! Video payloads are the raw encoded image, one message per frame, no
//! envelope.

use bytes::Bytes;
use contracts::{ContractError, Frame};
use image::codecs::jpeg;

/// Turns a frame into a payload
///
/// Encoding is CPU bound and runs on the blocking pool, so implementations
/// are synchronous.
pub trait FrameEncoder: Send + Sync + 'static {
    /// Codec name (used for logging)
    fn name(&self) -> &str;

    /// Encode one frame
    ///
    /// # Errors
    /// `Encode` if the frame cannot be encoded
    fn encode(&self, frame: &Frame) -> Result<Bytes, ContractError>;
}

/// Baseline JPEG encoder
#[derive(Debug, Clone, Copy)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// `quality` is clamped into 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(95)
    }
}

impl FrameEncoder for JpegEncoder {
    fn name(&self) -> &str {
        "jpeg"
    }

    fn encode(&self, frame: &Frame) -> Result<Bytes, ContractError> {
        let mut buf = Vec::with_capacity(frame.image.as_raw().len() / 8);
        jpeg::JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(&frame.image)
            .map_err(|e| ContractError::encode(frame.seq, e.to_string()))?;
        Ok(Bytes::from(buf))
    }
}
