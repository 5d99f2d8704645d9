//! MemoryTransport - in-process loopback broker
//!
//! Implements `Transport` without a network. Every accepted message is stored
//! for inspection and acknowledged according to an [`AckPolicy`]. Connection
//! loss and reconnect failure can be simulated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    ConnectOptions, ContractError, PublishAck, PublishOutcome, Transport, TransportEvent,
    TransportEventCallback,
};
use tracing::{debug, info, instrument, warn};

/// Reason code reported for a simulated delivery failure
pub const SIMULATED_FAILURE_CODE: u8 = 0x80;

/// How published messages are acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Every message succeeds
    #[default]
    AlwaysSucceed,
    /// The first `failures` of every `period` messages on a topic fail
    FailEvery { period: u64, failures: u64 },
    /// Accepted but never acknowledged
    Silent,
}

impl AckPolicy {
    /// Outcome of the `index`-th (0-based) message on a topic
    fn outcome(&self, index: u64) -> Option<PublishOutcome> {
        match *self {
            Self::AlwaysSucceed => Some(PublishOutcome::success()),
            Self::FailEvery { period, failures } => {
                if period > 0 && index % period < failures {
                    Some(PublishOutcome::failure(SIMULATED_FAILURE_CODE))
                } else {
                    Some(PublishOutcome::success())
                }
            }
            Self::Silent => None,
        }
    }
}

/// A message accepted by the loopback broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub message_id: u64,
    pub topic: String,
    pub payload: Bytes,
    /// `None` when the policy never acknowledges
    pub outcome: Option<PublishOutcome>,
}

#[derive(Debug, Default)]
struct MemoryState {
    options: Option<ConnectOptions>,
    connected: bool,
    next_message_id: u64,
    per_topic: HashMap<String, u64>,
    published: Vec<PublishedMessage>,
    reconnects: u32,
}

/// In-process transport
pub struct MemoryTransport {
    name: String,
    state: Mutex<MemoryState>,
    callback: RwLock<Option<TransportEventCallback>>,
    default_policy: AckPolicy,
    topic_policies: HashMap<String, AckPolicy>,
    ack_delay: Option<Duration>,
    refuse_connect: AtomicBool,
    refuse_reconnect: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            state: Mutex::new(MemoryState::default()),
            callback: RwLock::new(None),
            default_policy: AckPolicy::AlwaysSucceed,
            topic_policies: HashMap::new(),
            ack_delay: None,
            refuse_connect: AtomicBool::new(false),
            refuse_reconnect: AtomicBool::new(false),
        }
    }

    /// Policy for topics without their own policy
    pub fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Policy for one topic
    pub fn with_topic_policy(mut self, topic: impl Into<String>, policy: AckPolicy) -> Self {
        self.topic_policies.insert(topic.into(), policy);
        self
    }

    /// Deliver acknowledgements from a background task after `delay`
    ///
    /// Without a delay acks are delivered before `publish` returns.
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }

    /// Make `connect` fail
    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Make `reconnect` fail
    pub fn refuse_reconnect(&self, refuse: bool) {
        self.refuse_reconnect.store(refuse, Ordering::SeqCst);
    }

    /// Drop the session and emit `ConnectionLost`
    pub fn simulate_connection_lost(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.lock().connected = false;
        warn!(transport = %self.name, reason = %reason, "simulated connection loss");
        self.emit(TransportEvent::ConnectionLost { reason });
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Successful reconnects so far
    pub fn reconnect_count(&self) -> u32 {
        self.lock().reconnects
    }

    /// All accepted messages, in submission order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Accepted messages on one topic
    pub fn published_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callback(&self) -> Option<TransportEventCallback> {
        self.callback
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(callback) = self.callback() {
            callback(event);
        }
    }

    fn emit_ack(&self, ack: PublishAck) {
        let Some(callback) = self.callback() else {
            return;
        };
        match self.ack_delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback(TransportEvent::PublishAck(ack));
                });
            }
            None => callback(TransportEvent::PublishAck(ack)),
        }
    }

    fn policy_for(&self, topic: &str) -> AckPolicy {
        self.topic_policies
            .get(topic)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: TransportEventCallback) {
        *self
            .callback
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(callback);
    }

    #[instrument(name = "memory_transport_connect", skip(self, options), fields(client_id = %options.client_id))]
    async fn connect(&self, options: &ConnectOptions) -> Result<(), ContractError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(ContractError::transport_connection(
                &self.name,
                "connection refused",
            ));
        }
        {
            let mut state = self.lock();
            state.options = Some(options.clone());
            state.connected = true;
        }
        info!(transport = %self.name, "connected");
        self.emit(TransportEvent::Connected { code: 0 });
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), ContractError> {
        if self.refuse_reconnect.load(Ordering::SeqCst) {
            return Err(ContractError::transport_connection(
                &self.name,
                "reconnect refused",
            ));
        }
        {
            let mut state = self.lock();
            if state.options.is_none() {
                return Err(ContractError::transport_connection(
                    &self.name,
                    "reconnect before connect",
                ));
            }
            state.connected = true;
            state.reconnects += 1;
        }
        self.emit(TransportEvent::Connected { code: 0 });
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError> {
        let ack = {
            let mut state = self.lock();
            if !state.connected {
                return Err(ContractError::transport_publish(
                    &self.name,
                    topic,
                    "not connected",
                ));
            }
            let max = state
                .options
                .as_ref()
                .map(|o| o.max_payload_bytes)
                .unwrap_or(usize::MAX);
            if payload.len() > max {
                return Err(ContractError::PayloadTooLarge {
                    topic: topic.to_string(),
                    size: payload.len(),
                    max,
                });
            }

            let message_id = state.next_message_id;
            state.next_message_id += 1;
            let index = state.per_topic.entry(topic.to_string()).or_insert(0);
            let outcome = self.policy_for(topic).outcome(*index);
            *index += 1;

            state.published.push(PublishedMessage {
                message_id,
                topic: topic.to_string(),
                payload,
                outcome,
            });
            outcome.map(|outcome| PublishAck {
                message_id,
                topic: topic.to_string(),
                outcome,
            })
        };

        debug!(transport = %self.name, topic, "message accepted");
        if let Some(ack) = ack {
            self.emit_ack(ack);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.lock().connected = false;
        info!(transport = %self.name, "disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder(transport: &MemoryTransport) -> Arc<Mutex<Vec<TransportEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        transport.listen(Arc::new(move |event| sink.lock().unwrap().push(event)));
        events
    }

    #[tokio::test]
    async fn test_connect_emits_connected() {
        let transport = MemoryTransport::new();
        let events = recorder(&transport);

        transport.connect(&ConnectOptions::default()).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(
            events.lock().unwrap()[0],
            TransportEvent::Connected { code: 0 }
        );
    }

    #[tokio::test]
    async fn test_publish_before_connect_fails() {
        let transport = MemoryTransport::new();
        let err = transport
            .publish("video", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::TransportPublish { .. }));
    }

    #[tokio::test]
    async fn test_ack_delivered_before_publish_returns() {
        let transport = MemoryTransport::new();
        let events = recorder(&transport);
        transport.connect(&ConnectOptions::default()).await.unwrap();

        transport
            .publish("video", Bytes::from_static(b"frame"))
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            TransportEvent::PublishAck(ack) => {
                assert_eq!(ack.topic, "video");
                assert!(ack.outcome.success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fail_every_policy_per_topic() {
        let transport = MemoryTransport::new().with_topic_policy(
            "video",
            AckPolicy::FailEvery {
                period: 10,
                failures: 2,
            },
        );
        transport.connect(&ConnectOptions::default()).await.unwrap();

        for _ in 0..20 {
            transport.publish("video", Bytes::new()).await.unwrap();
            transport.publish("gps", Bytes::new()).await.unwrap();
        }

        let failed = |topic: &str| {
            transport
                .published_on(topic)
                .iter()
                .filter(|m| m.outcome.is_some_and(|o| o.is_failure()))
                .count()
        };
        assert_eq!(failed("video"), 4);
        assert_eq!(failed("gps"), 0);
        assert_eq!(transport.published().len(), 40);
    }

    #[tokio::test]
    async fn test_payload_ceiling() {
        let transport = MemoryTransport::new();
        let options = ConnectOptions {
            max_payload_bytes: 4,
            ..Default::default()
        };
        transport.connect(&options).await.unwrap();

        assert!(transport.publish("video", Bytes::from_static(b"1234")).await.is_ok());
        let err = transport
            .publish("video", Bytes::from_static(b"12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::PayloadTooLarge { size: 5, max: 4, .. }));
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_loss_and_reconnect() {
        let transport = MemoryTransport::new();
        let events = recorder(&transport);
        transport.connect(&ConnectOptions::default()).await.unwrap();

        transport.simulate_connection_lost("broker restarted");
        assert!(!transport.is_connected());
        assert!(transport.publish("video", Bytes::new()).await.is_err());

        transport.reconnect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.reconnect_count(), 1);
        assert!(events.lock().unwrap().contains(&TransportEvent::ConnectionLost {
            reason: "broker restarted".into()
        }));
    }

    #[tokio::test]
    async fn test_refused_reconnect() {
        let transport = MemoryTransport::new();
        transport.connect(&ConnectOptions::default()).await.unwrap();
        transport.refuse_reconnect(true);
        transport.simulate_connection_lost("gone");

        assert!(transport.reconnect().await.is_err());
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_delayed_ack() {
        let transport = MemoryTransport::new().with_ack_delay(Duration::from_millis(20));
        let events = recorder(&transport);
        transport.connect(&ConnectOptions::default()).await.unwrap();
        transport.publish("video", Bytes::new()).await.unwrap();

        assert_eq!(events.lock().unwrap().len(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_silent_policy() {
        let transport = MemoryTransport::new().with_ack_policy(AckPolicy::Silent);
        let events = recorder(&transport);
        transport.connect(&ConnectOptions::default()).await.unwrap();
        transport.publish("video", Bytes::new()).await.unwrap();

        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(transport.published()[0].outcome, None);
    }
}
