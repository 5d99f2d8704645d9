//! Image sequence source
//!
//! Reads still images from a directory in file name order. Decoding runs on
//! the blocking pool.

use std::path::{Path, PathBuf};

use contracts::{ContractError, FrameSource};
use image::RgbImage;
use tracing::{debug, info, instrument};

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Directory of still images played back as a video
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    name: String,
    files: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
    loop_playback: bool,
}

impl ImageSequenceSource {
    /// Scan `dir` for supported images
    ///
    /// # Errors
    /// `SourceOpen` if the directory cannot be read or contains no images
    #[instrument(name = "image_sequence_open", skip(dir), fields(dir = %dir.display()))]
    pub fn open(dir: &Path, fps: f64, loop_playback: bool) -> Result<Self, ContractError> {
        let name = dir.display().to_string();
        let open_error = |message: String| ContractError::SourceOpen {
            source_name: name.clone(),
            message,
        };

        let entries = std::fs::read_dir(dir).map_err(|e| open_error(e.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| open_error(e.to_string()))?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(open_error("no .jpg/.jpeg/.png files found".to_string()));
        }
        files.sort();

        info!(frames = files.len(), fps, loop_playback, "image sequence opened");
        Ok(Self {
            name,
            files,
            cursor: 0,
            fps,
            loop_playback,
        })
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn nominal_rate_hz(&self) -> f64 {
        self.fps
    }

    async fn read_frame(&mut self) -> Result<Option<RgbImage>, ContractError> {
        if self.cursor >= self.files.len() {
            if !self.loop_playback || self.files.is_empty() {
                return Ok(None);
            }
            debug!("image sequence rewound");
            self.cursor = 0;
        }

        let path = self.files[self.cursor].clone();
        self.cursor += 1;

        let display = path.display().to_string();
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| ContractError::source_read(&self.name, e.to_string()))?;
        let image = decoded
            .map_err(|e| ContractError::source_read(&self.name, format!("{display}: {e}")))?;
        Ok(Some(image.to_rgb8()))
    }

    async fn release(&mut self) {
        debug!(source = %self.name, position = self.cursor, "image sequence released");
    }
}
