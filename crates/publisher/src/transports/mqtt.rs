//! MqttTransport - MQTT 3.1.1 client over rumqttc
//!
//! The rumqttc event loop runs on a driver task that translates network
//! events into [`TransportEvent`]s:
//!
//! - `ConnAck` -> `Connected`
//! - `PubAck` (QoS 1) or the outgoing write (QoS 0) -> `PublishAck`
//! - event loop error -> `ConnectionLost`, after which the driver stops
//!
//! `reconnect` replaces the session with a fresh client and event loop.
//! Closing a session sends DISCONNECT first and lets the driver write it
//! before the driver is cancelled.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    ConnectOptions, ContractError, PublishAck, PublishOutcome, QosLevel, Transport,
    TransportEvent, TransportEventCallback,
};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Request queue between client handle and event loop
const REQUEST_CAPACITY: usize = 64;

/// Header room on top of the payload ceiling (fixed header + topic)
const PACKET_OVERHEAD: usize = 1024;

/// How long `connect`/`reconnect` wait for the broker's ConnAck
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a closing session may take to flush DISCONNECT
const DISCONNECT_FLUSH: Duration = Duration::from_millis(500);

type SharedCallback = Arc<RwLock<Option<TransportEventCallback>>>;

/// Topics of submitted messages awaiting their outgoing write / PubAck
#[derive(Debug, Default)]
struct PendingAcks {
    /// Submitted, not yet written (FIFO, matches the event loop order)
    queued: VecDeque<String>,
    /// Written with QoS 1, waiting for PubAck
    inflight: HashMap<u16, String>,
    /// Local ids for QoS 0 messages
    next_local_id: u64,
}

struct MqttSession {
    client: AsyncClient,
    pending: Arc<Mutex<PendingAcks>>,
    /// Set before DISCONNECT is requested; the driver then exits quietly
    closing: Arc<AtomicBool>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

/// MQTT transport
pub struct MqttTransport {
    name: String,
    callback: SharedCallback,
    options: Mutex<Option<ConnectOptions>>,
    session: Mutex<Option<MqttSession>>,
}

impl MqttTransport {
    pub fn new() -> Self {
        Self {
            name: "mqtt".to_string(),
            callback: Arc::new(RwLock::new(None)),
            options: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn qos(options: &ConnectOptions) -> QoS {
        match options.qos {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        }
    }

    fn mqtt_options(options: &ConnectOptions) -> MqttOptions {
        let mut mqtt = MqttOptions::new(&options.client_id, &options.host, options.port);
        let packet_limit = options.max_payload_bytes.saturating_add(PACKET_OVERHEAD);
        mqtt.set_keep_alive(options.keepalive)
            .set_max_packet_size(packet_limit, packet_limit)
            .set_inflight(options.max_inflight)
            .set_clean_session(true);
        mqtt
    }

    /// Open a session and wait for the broker's ConnAck
    async fn open_session(&self, options: &ConnectOptions) -> Result<MqttSession, ContractError> {
        let (client, mut eventloop) =
            AsyncClient::new(Self::mqtt_options(options), REQUEST_CAPACITY);

        let code = tokio::time::timeout(CONNACK_TIMEOUT, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| ContractError::transport_connection(&self.name, "timed out waiting for ConnAck"))?
            .map_err(|message| ContractError::transport_connection(&self.name, message))?;

        info!(
            transport = %self.name,
            host = %options.host,
            port = options.port,
            code,
            "Connected with result code {}",
            code
        );
        emit(&self.callback, TransportEvent::Connected { code });

        let pending = Arc::new(Mutex::new(PendingAcks::default()));
        let closing = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            eventloop,
            self.callback.clone(),
            pending.clone(),
            Self::qos(options),
            closing.clone(),
            cancel.clone(),
        ));

        Ok(MqttSession {
            client,
            pending,
            closing,
            cancel,
            driver,
        })
    }

    /// Stop the current session, if any
    ///
    /// The driver keeps polling until DISCONNECT is written (or the flush
    /// window runs out), so the broker sees a clean close and no Last Will.
    async fn close_session(&self) {
        let Some(session) = Self::lock(&self.session).take() else {
            return;
        };
        session.closing.store(true, Ordering::SeqCst);
        if let Err(e) = session.client.disconnect().await {
            debug!(transport = %self.name, error = %e, "disconnect request not delivered");
        }

        let mut driver = session.driver;
        let joined = match tokio::time::timeout(DISCONNECT_FLUSH, &mut driver).await {
            Ok(joined) => joined,
            Err(_) => {
                debug!(transport = %self.name, "DISCONNECT not flushed in time, dropping session");
                session.cancel.cancel();
                driver.await
            }
        };
        if let Err(e) = joined {
            error!(transport = %self.name, error = ?e, "MQTT driver task panicked");
        }
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MqttTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn listen(&self, callback: TransportEventCallback) {
        *self
            .callback
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(callback);
    }

    #[instrument(
        name = "mqtt_transport_connect",
        skip(self, options),
        fields(host = %options.host, port = options.port)
    )]
    async fn connect(&self, options: &ConnectOptions) -> Result<(), ContractError> {
        self.close_session().await;
        let session = self.open_session(options).await?;
        *Self::lock(&self.options) = Some(options.clone());
        *Self::lock(&self.session) = Some(session);
        Ok(())
    }

    #[instrument(name = "mqtt_transport_reconnect", skip(self))]
    async fn reconnect(&self) -> Result<(), ContractError> {
        let options = Self::lock(&self.options).clone().ok_or_else(|| {
            ContractError::transport_connection(&self.name, "reconnect before connect")
        })?;
        self.close_session().await;
        let session = self.open_session(&options).await?;
        *Self::lock(&self.session) = Some(session);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ContractError> {
        let (max, qos) = {
            let options = Self::lock(&self.options);
            let options = options.as_ref().ok_or_else(|| {
                ContractError::transport_publish(&self.name, topic, "not connected")
            })?;
            (options.max_payload_bytes, Self::qos(options))
        };
        if payload.len() > max {
            return Err(ContractError::PayloadTooLarge {
                topic: topic.to_string(),
                size: payload.len(),
                max,
            });
        }

        let session = Self::lock(&self.session);
        let session = session.as_ref().ok_or_else(|| {
            ContractError::transport_publish(&self.name, topic, "not connected")
        })?;

        // Holding the queue lock across submission keeps the queue in event loop order
        let mut pending = Self::lock(session.pending.as_ref());
        session
            .client
            .try_publish(topic, qos, false, payload.to_vec())
            .map_err(|e| ContractError::transport_publish(&self.name, topic, e.to_string()))?;
        pending.queued.push_back(topic.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ContractError> {
        self.close_session().await;
        info!(transport = %self.name, "disconnected");
        Ok(())
    }
}

fn emit(callback: &SharedCallback, event: TransportEvent) {
    let callback = callback
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    if let Some(callback) = callback {
        callback(event);
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<u8, String> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(0),
                    code => Err(format!("broker refused connection: {code:?}")),
                };
            }
            Ok(_) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Event loop driver
async fn drive(
    mut eventloop: EventLoop,
    callback: SharedCallback,
    pending: Arc<Mutex<PendingAcks>>,
    qos: QoS,
    closing: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                let ack = {
                    let mut pending = MqttTransport::lock(pending.as_ref());
                    let Some(topic) = pending.queued.pop_front() else {
                        continue;
                    };
                    if qos == QoS::AtMostOnce {
                        let message_id = pending.next_local_id;
                        pending.next_local_id += 1;
                        Some(PublishAck {
                            message_id,
                            topic,
                            outcome: PublishOutcome::success(),
                        })
                    } else {
                        pending.inflight.insert(pkid, topic);
                        None
                    }
                };
                if let Some(ack) = ack {
                    emit(&callback, TransportEvent::PublishAck(ack));
                }
            }
            Ok(Event::Incoming(Packet::PubAck(puback))) => {
                let topic = MqttTransport::lock(pending.as_ref()).inflight.remove(&puback.pkid);
                if let Some(topic) = topic {
                    emit(
                        &callback,
                        TransportEvent::PublishAck(PublishAck {
                            message_id: puback.pkid as u64,
                            topic,
                            outcome: PublishOutcome::success(),
                        }),
                    );
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!(code = ?ack.code, "unexpected ConnAck on established session");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("DISCONNECT written");
                break;
            }
            Ok(_) => {}
            Err(e) if closing.load(Ordering::SeqCst) => {
                debug!(error = %e, "MQTT connection closed while disconnecting");
                break;
            }
            Err(e) => {
                let dropped = {
                    let mut pending = MqttTransport::lock(pending.as_ref());
                    let dropped = pending.queued.len() + pending.inflight.len();
                    pending.queued.clear();
                    pending.inflight.clear();
                    dropped
                };
                warn!(error = %e, unacknowledged = dropped, "MQTT connection lost");
                emit(
                    &callback,
                    TransportEvent::ConnectionLost {
                        reason: e.to_string(),
                    },
                );
                break;
            }
        }
    }
    debug!("MQTT driver stopped");
}
