//! Transport trait - pub/sub client boundary
//!
//! Publishing is fire-and-forget from the caller's point of view: delivery
//! outcomes come back later as [`TransportEvent::PublishAck`] through the
//! callback registered with `listen`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Delivery guarantee requested from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosLevel {
    /// Acknowledged once the message is written to the network
    #[default]
    AtMostOnce,
    /// Acknowledged by the broker
    AtLeastOnce,
}

/// Session parameters for `connect`
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keepalive: Duration,
    /// Maximum unacknowledged messages in flight
    pub max_inflight: u16,
    /// Maximum payload size accepted by `publish`
    pub max_payload_bytes: usize,
    pub qos: QosLevel,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "adaptive-streamer".to_string(),
            keepalive: Duration::from_secs(60),
            max_inflight: 20,
            max_payload_bytes: 10 * 1024 * 1024,
            qos: QosLevel::AtMostOnce,
        }
    }
}

/// Result of a single publish attempt as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    /// Transport specific reason code (0 = success)
    pub code: u8,
}

impl PublishOutcome {
    pub const fn success() -> Self {
        Self {
            success: true,
            code: 0,
        }
    }

    pub const fn failure(code: u8) -> Self {
        Self {
            success: false,
            code,
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

/// Asynchronous publish acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub message_id: u64,
    pub topic: String,
    pub outcome: PublishOutcome,
}

/// Connection and delivery events emitted by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session established (or re-established)
    Connected { code: u8 },

    /// Session dropped
    ConnectionLost { reason: String },

    /// Delivery outcome of an earlier `publish`
    PublishAck(PublishAck),
}

/// Transport event callback
///
/// Invoked from whatever context the transport produces the event in (the
/// caller of `publish`, a network task, ...). Must not block.
pub type TransportEventCallback = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// Pub/sub client
///
/// All methods take `&self` so a single client can be shared by the publish
/// loop, the telemetry loop and the connection supervisor.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Register the event callback
    ///
    /// Replaces any previously registered callback. Should be called before
    /// `connect` so the first `Connected` event is not missed.
    fn listen(&self, callback: TransportEventCallback);

    /// Establish the session
    async fn connect(&self, options: &ConnectOptions) -> Result<(), ContractError>;

    /// Re-establish a lost session using the options of the last `connect`
    async fn reconnect(&self) -> Result<(), ContractError>;

    /// Submit a payload
    ///
    /// `Ok` means the payload was accepted for delivery, not that it was delivered.
    ///
    /// # Errors
    /// Returns synchronous submission failure (disconnected, queue full, too large)
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError>;

    /// Close the session
    async fn disconnect(&self) -> Result<(), ContractError>;
}
