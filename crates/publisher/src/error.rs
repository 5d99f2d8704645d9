//! Publisher error types

use thiserror::Error;

/// Publisher-specific errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// Encoder task panicked or was cancelled
    #[error("encode task for frame {frame_seq} failed: {message}")]
    EncodeTask { frame_seq: u64, message: String },

    /// Telemetry report could not be serialized
    #[error("telemetry serialize error: {0}")]
    TelemetrySerialize(#[from] serde_json::Error),

    /// Codec or transport error (from contract)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl PublishError {
    /// Create an encode task error
    pub fn encode_task(frame_seq: u64, message: impl Into<String>) -> Self {
        Self::EncodeTask {
            frame_seq,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
