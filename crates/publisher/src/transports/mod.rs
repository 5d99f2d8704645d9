//! Transport implementations

mod memory;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use memory::{AckPolicy, MemoryTransport, PublishedMessage, SIMULATED_FAILURE_CODE};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;
