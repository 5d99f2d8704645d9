//! Capture 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Capture 错误
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 视频源读取失败
    #[error(transparent)]
    Read(#[from] ContractError),

    /// 缩放任务失败
    #[error("failed to resize frame {frame_seq}: {message}")]
    Resize {
        /// 帧序号
        frame_seq: u64,
        /// 错误消息
        message: String,
    },

    /// 缓冲区已被关闭
    #[error("frame buffer closed before frame {frame_seq} could be queued")]
    BufferClosed {
        /// 帧序号
        frame_seq: u64,
    },
}

/// Capture Result 类型别名
pub type Result<T> = std::result::Result<T, CaptureError>;
