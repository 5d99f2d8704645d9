//! Video file / capture device source backed by FFmpeg
//!
//! Demuxing, decoding and RGB conversion run on one blocking thread that owns
//! every FFmpeg object. Decoded frames are handed over through a single-slot
//! channel, so the decoder never runs ahead of the capture loop by more than
//! one frame.

use std::path::Path;

use contracts::{ContractError, FrameSource};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::{context::Input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{self, Flags};
use image::RgbImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

type DecodedFrame = Result<RgbImage, ContractError>;

/// Video decoded through FFmpeg: container files (mp4, avi, ...) or devices
/// (v4l2 cameras, lavfi test sources)
#[derive(Debug)]
pub struct VideoSource {
    name: String,
    fps: f64,
    frames: mpsc::Receiver<DecodedFrame>,
    cancel: CancellationToken,
    decoder: Option<JoinHandle<()>>,
}

impl VideoSource {
    /// Open a video file; the initial rate is the container's average frame rate
    ///
    /// # Errors
    /// `SourceOpen` if the file cannot be opened or has no decodable video stream
    #[instrument(name = "video_file_open", skip(path), fields(path = %path.display()))]
    pub fn open_file(path: &Path) -> Result<Self, ContractError> {
        let name = path.display().to_string();
        init(&name)?;
        let input = ffmpeg::format::input(path).map_err(|e| open_error(&name, e))?;
        Self::start(name, input)
    }

    /// Open a capture device by input format name, e.g. `("v4l2", "/dev/video0")`
    ///
    /// # Errors
    /// `SourceOpen` if the format is unknown or the device cannot be opened
    #[instrument(name = "video_device_open")]
    pub fn open_device(format: &str, input: &str) -> Result<Self, ContractError> {
        let name = format!("{format}:{input}");
        init(&name)?;
        let device = ffmpeg::device::input::video()
            .find(|candidate| candidate.name() == format)
            .ok_or_else(|| open_error(&name, format!("input format '{format}' not found")))?;
        let input = ffmpeg::format::open_with(Path::new(input), &device, ffmpeg::Dictionary::new())
            .map_err(|e| open_error(&name, e))?
            .input();
        Self::start(name, input)
    }

    fn start(name: String, input: Input) -> Result<Self, ContractError> {
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| open_error(&name, "no video stream"))?;
        let stream_index = stream.index();
        let fps = frame_rate(stream.avg_frame_rate())
            .or_else(|| frame_rate(stream.rate()))
            .unwrap_or(0.0);

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|e| open_error(&name, e))?;
        info!(
            source = %name,
            fps,
            width = decoder.width(),
            height = decoder.height(),
            codec = ?decoder.id(),
            "video source opened"
        );

        let (tx, frames) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let worker = DecodeWorker {
            name: name.clone(),
            input,
            stream_index,
            decoder,
            tx,
            cancel: cancel.clone(),
        };
        let decoder = tokio::task::spawn_blocking(move || worker.run());

        Ok(Self {
            name,
            fps,
            frames,
            cancel,
            decoder: Some(decoder),
        })
    }
}

fn init(name: &str) -> Result<(), ContractError> {
    ffmpeg::init().map_err(|e| open_error(name, format!("ffmpeg init: {e}")))
}

fn open_error(name: &str, message: impl ToString) -> ContractError {
    ContractError::SourceOpen {
        source_name: name.to_string(),
        message: message.to_string(),
    }
}

/// Rate as Hz, `None` when unset (0/0) or nonsensical
fn frame_rate(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(f64::from(rate))
}

impl FrameSource for VideoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn nominal_rate_hz(&self) -> f64 {
        self.fps
    }

    async fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        // A closed channel means the decoder reached end of stream
        self.frames.recv().await.transpose()
    }

    async fn release(&mut self) {
        self.cancel.cancel();
        self.frames.close();
        if let Some(decoder) = self.decoder.take() {
            if let Err(e) = decoder.await {
                warn!(source = %self.name, error = %e, "video decoder task failed");
            }
        }
        debug!(source = %self.name, "video source released");
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the FFmpeg state for one source
struct DecodeWorker {
    name: String,
    input: Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    tx: mpsc::Sender<DecodedFrame>,
    cancel: CancellationToken,
}

/// Why decoding stopped early
enum Halt {
    /// Reader gone or cancelled
    Stopped,
    Failed(String),
}

impl From<ffmpeg::Error> for Halt {
    fn from(e: ffmpeg::Error) -> Self {
        Halt::Failed(e.to_string())
    }
}

impl DecodeWorker {
    fn run(mut self) {
        match self.decode_all() {
            Ok(frames) => debug!(source = %self.name, frames, "video stream ended"),
            Err(Halt::Stopped) => debug!(source = %self.name, "video decoding stopped"),
            Err(Halt::Failed(message)) => {
                let _ = self
                    .tx
                    .blocking_send(Err(ContractError::source_read(&self.name, message)));
            }
        }
    }

    fn decode_all(&mut self) -> Result<u64, Halt> {
        let mut scaler = scaling::Context::get(
            self.decoder.format(),
            self.decoder.width(),
            self.decoder.height(),
            Pixel::RGB24,
            self.decoder.width(),
            self.decoder.height(),
            Flags::BILINEAR,
        )?;
        let mut sent = 0;

        let stream_index = self.stream_index;
        for (stream, packet) in self.input.packets() {
            if self.cancel.is_cancelled() {
                return Err(Halt::Stopped);
            }
            if stream.index() != stream_index {
                continue;
            }
            self.decoder.send_packet(&packet)?;
            sent += drain(&mut self.decoder, &mut scaler, &self.tx, &self.cancel)?;
        }

        self.decoder.send_eof()?;
        sent += drain(&mut self.decoder, &mut scaler, &self.tx, &self.cancel)?;
        Ok(sent)
    }
}

/// Forward every frame the decoder has ready
fn drain(
    decoder: &mut ffmpeg::codec::decoder::Video,
    scaler: &mut scaling::Context,
    tx: &mpsc::Sender<DecodedFrame>,
    cancel: &CancellationToken,
) -> Result<u64, Halt> {
    let mut decoded = ffmpeg::frame::Video::empty();
    let mut sent = 0;
    // EAGAIN and EOF both end the drain
    while decoder.receive_frame(&mut decoded).is_ok() {
        if cancel.is_cancelled() {
            return Err(Halt::Stopped);
        }
        let mut rgb = ffmpeg::frame::Video::empty();
        scaler.run(&decoded, &mut rgb)?;
        let image = to_rgb_image(&rgb)
            .ok_or_else(|| Halt::Failed("decoded frame has an unexpected layout".to_string()))?;
        tx.blocking_send(Ok(image)).map_err(|_| Halt::Stopped)?;
        sent += 1;
    }
    Ok(sent)
}

/// Copy a packed RGB24 frame, dropping per-row padding
fn to_rgb_image(frame: &ffmpeg::frame::Video) -> Option<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(data.get(start..start + row_bytes)?);
    }
    RgbImage::from_raw(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// lavfi testsrc: 1 s of 64x48 frames at 10 fps
    const TEST_CLIP: &str = "testsrc=duration=1:size=64x48:rate=10";

    #[tokio::test]
    async fn test_generated_clip_decodes_to_end() {
        let mut source = VideoSource::open_device("lavfi", TEST_CLIP).unwrap();
        assert_eq!(source.name(), format!("lavfi:{TEST_CLIP}"));
        assert_eq!(source.nominal_rate_hz(), 10.0);

        let mut frames = 0;
        while let Some(image) = source.read_frame().await.unwrap() {
            assert_eq!(image.dimensions(), (64, 48));
            frames += 1;
        }
        assert_eq!(frames, 10);
        assert!(source.read_frame().await.unwrap().is_none());
        source.release().await;
    }

    #[tokio::test]
    async fn test_release_stops_decoder_mid_stream() {
        let mut source =
            VideoSource::open_device("lavfi", "testsrc=duration=60:size=32x24:rate=25").unwrap();
        assert!(source.read_frame().await.unwrap().is_some());
        source.release().await;
        assert!(source.decoder.is_none());
    }

    #[tokio::test]
    async fn test_still_image_file_is_a_one_frame_video() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(16, 12, image::Rgb([200, 40, 10]))
            .save(&path)
            .unwrap();

        let mut source = VideoSource::open_file(&path).unwrap();
        let image = source.read_frame().await.unwrap().unwrap();
        assert_eq!(image.dimensions(), (16, 12));
        assert_eq!(image.get_pixel(3, 3), &image::Rgb([200, 40, 10]));
        assert!(source.read_frame().await.unwrap().is_none());
        source.release().await;
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let err = VideoSource::open_file(Path::new("/nonexistent/test.mp4")).unwrap_err();
        assert!(matches!(err, ContractError::SourceOpen { .. }));
    }

    #[test]
    fn test_unknown_device_format() {
        let err = VideoSource::open_device("no_such_grabber", "/dev/null").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
