//! Layered error definitions
//!
//! Categorized by source: config / source / codec / transport / buffer

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Frame Source Errors =====
    /// Frame source could not be opened
    #[error("frame source '{source_name}' open error: {message}")]
    SourceOpen {
        source_name: String,
        message: String,
    },

    /// Frame source read failure
    #[error("frame source '{source_name}' read error: {message}")]
    SourceRead {
        source_name: String,
        message: String,
    },

    // ===== Codec Errors =====
    /// Frame encode failure
    #[error("encode error for frame {frame_seq}: {message}")]
    Encode { frame_seq: u64, message: String },

    // ===== Transport Errors =====
    /// Transport connection error
    #[error("transport '{transport}' connection error: {message}")]
    TransportConnection { transport: String, message: String },

    /// Synchronous publish submission failure
    #[error("transport '{transport}' publish to '{topic}' failed: {message}")]
    TransportPublish {
        transport: String,
        topic: String,
        message: String,
    },

    /// Payload exceeds the negotiated ceiling
    #[error("payload of {size} bytes exceeds limit of {max} bytes on topic '{topic}'")]
    PayloadTooLarge {
        topic: String,
        size: usize,
        max: usize,
    },

    // ===== Buffer Errors =====
    /// Frame buffer already closed by the producer
    #[error("frame buffer closed, frame {frame_seq} rejected")]
    BufferClosed { frame_seq: u64 },

    // ===== General Errors =====
    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create frame source read error
    pub fn source_read(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(frame_seq: u64, message: impl Into<String>) -> Self {
        Self::Encode {
            frame_seq,
            message: message.into(),
        }
    }

    /// Create transport connection error
    pub fn transport_connection(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportConnection {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create publish submission error
    pub fn transport_publish(
        transport: impl Into<String>,
        topic: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransportPublish {
            transport: transport.into(),
            topic: topic.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContractError::config_validation("rate.min_hz", "must be > 0");
        assert_eq!(
            err.to_string(),
            "config validation error at 'rate.min_hz': must be > 0"
        );

        let err = ContractError::PayloadTooLarge {
            topic: "video".to_string(),
            size: 20,
            max: 10,
        };
        assert!(err.to_string().contains("exceeds limit of 10 bytes"));
    }
}
