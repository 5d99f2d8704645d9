//! Frame sources

mod image_sequence;
mod synthetic;
#[cfg(feature = "video")]
mod video;

pub use image_sequence::ImageSequenceSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "video")]
pub use video::VideoSource;

use contracts::{ContractError, FrameSource, SourceConfig};
use image::RgbImage;

/// Source selected by configuration
#[derive(Debug)]
pub enum ConfiguredSource {
    ImageSequence(ImageSequenceSource),
    Synthetic(SyntheticSource),
    #[cfg(feature = "video")]
    Video(VideoSource),
}

impl ConfiguredSource {
    /// Open the source described by `config`
    ///
    /// # Errors
    /// `SourceOpen` if the source cannot be opened
    pub fn from_config(config: &SourceConfig) -> Result<Self, ContractError> {
        match config {
            SourceConfig::ImageSequence {
                path,
                fps,
                loop_playback,
            } => ImageSequenceSource::open(path, *fps, *loop_playback).map(Self::ImageSequence),
            SourceConfig::Synthetic {
                fps,
                width,
                height,
                max_frames,
            } => {
                let source = SyntheticSource::new(*width, *height, *fps);
                Ok(Self::Synthetic(match max_frames {
                    Some(max) => source.with_max_frames(*max),
                    None => source,
                }))
            }
            #[cfg(feature = "video")]
            SourceConfig::VideoFile { path } => VideoSource::open_file(path).map(Self::Video),
            #[cfg(feature = "video")]
            SourceConfig::VideoDevice { format, input } => {
                VideoSource::open_device(format, input).map(Self::Video)
            }
            #[cfg(not(feature = "video"))]
            SourceConfig::VideoFile { .. } | SourceConfig::VideoDevice { .. } => {
                Err(ContractError::SourceOpen {
                    source_name: config.kind_name().to_string(),
                    message: "built without the `video` feature".to_string(),
                })
            }
        }
    }
}

impl FrameSource for ConfiguredSource {
    fn name(&self) -> &str {
        match self {
            Self::ImageSequence(source) => source.name(),
            Self::Synthetic(source) => source.name(),
            #[cfg(feature = "video")]
            Self::Video(source) => source.name(),
        }
    }

    fn nominal_rate_hz(&self) -> f64 {
        match self {
            Self::ImageSequence(source) => source.nominal_rate_hz(),
            Self::Synthetic(source) => source.nominal_rate_hz(),
            #[cfg(feature = "video")]
            Self::Video(source) => source.nominal_rate_hz(),
        }
    }

    async fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        match self {
            Self::ImageSequence(source) => source.read_frame().await,
            Self::Synthetic(source) => source.read_frame().await,
            #[cfg(feature = "video")]
            Self::Video(source) => source.read_frame().await,
        }
    }

    async fn release(&mut self) {
        match self {
            Self::ImageSequence(source) => source.release().await,
            Self::Synthetic(source) => source.release().await,
            #[cfg(feature = "video")]
            Self::Video(source) => source.release().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_synthetic_config() {
        let config = SourceConfig::Synthetic {
            fps: 12.0,
            width: 8,
            height: 6,
            max_frames: Some(1),
        };
        let mut source = ConfiguredSource::from_config(&config).unwrap();
        assert_eq!(source.name(), "synthetic");
        assert_eq!(source.nominal_rate_hz(), 12.0);
        assert!(source.read_frame().await.unwrap().is_some());
        assert!(source.read_frame().await.unwrap().is_none());
        source.release().await;
    }

    #[test]
    fn test_from_missing_image_sequence() {
        let config = SourceConfig::ImageSequence {
            path: "/nonexistent/frames".into(),
            fps: 25.0,
            loop_playback: false,
        };
        assert!(ConfiguredSource::from_config(&config).is_err());
    }

    #[cfg(not(feature = "video"))]
    #[test]
    fn test_video_file_needs_video_feature() {
        let config = SourceConfig::VideoFile {
            path: "test.mp4".into(),
        };
        let err = ConfiguredSource::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("`video` feature"));
    }

    #[cfg(feature = "video")]
    #[tokio::test]
    async fn test_from_video_device_config() {
        let config = SourceConfig::VideoDevice {
            format: "lavfi".to_string(),
            input: "testsrc=duration=1:size=32x24:rate=5".to_string(),
        };
        let mut source = ConfiguredSource::from_config(&config).unwrap();
        assert_eq!(source.nominal_rate_hz(), 5.0);
        assert!(source.read_frame().await.unwrap().is_some());
        source.release().await;
    }
}
