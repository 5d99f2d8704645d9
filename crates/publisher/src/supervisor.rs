//! ConnectionSupervisor - reacts to transport events
//!
//! Acknowledgements are recorded synchronously inside the transport callback,
//! so an ack that arrives before its attempt is counted still lands in the
//! same window. Connection losses are forwarded to the supervisor task, which
//! makes exactly one reconnect attempt per loss.

use std::sync::Arc;

use contracts::{PublishAck, Transport, TransportEvent, TransportEventCallback};
use rate_control::RateWindow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::PublisherMetrics;

/// Handles transport events for one session
pub struct ConnectionSupervisor<T> {
    transport: Arc<T>,
    metrics: Arc<PublisherMetrics>,
    lost_rx: mpsc::UnboundedReceiver<String>,
}

impl<T> ConnectionSupervisor<T>
where
    T: Transport + Sync + 'static,
{
    /// Register the event callback on `transport`
    ///
    /// Call before `connect` so the first `Connected` event is observed.
    pub fn attach(
        transport: Arc<T>,
        video_topic: impl Into<String>,
        window: Arc<RateWindow>,
        metrics: Arc<PublisherMetrics>,
    ) -> Self {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let handler = EventHandler {
            video_topic: video_topic.into(),
            window,
            metrics: metrics.clone(),
            lost_tx,
        };
        let callback: TransportEventCallback = Arc::new(move |event| handler.handle(event));
        transport.listen(callback);

        Self {
            transport,
            metrics,
            lost_rx,
        }
    }

    /// Process connection losses until `cancel` fires
    #[instrument(name = "connection_supervisor", skip_all, fields(transport = %self.transport.name()))]
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("connection supervisor started");
        loop {
            let reason = tokio::select! {
                _ = cancel.cancelled() => break,
                reason = self.lost_rx.recv() => match reason {
                    Some(reason) => reason,
                    None => break,
                },
            };

            info!(reason = %reason, "attempting reconnect");
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.transport.reconnect() => result,
            };
            self.metrics.record_reconnect(result.is_ok());
            match result {
                Ok(()) => {
                    info!("reconnected");
                }
                Err(e) => {
                    error!(error = %e, "reconnect failed");
                    observability::record_connection_event("reconnect_failed");
                }
            }
        }
        debug!("connection supervisor stopped");
    }
}

/// State captured by the transport callback
struct EventHandler {
    video_topic: String,
    window: Arc<RateWindow>,
    metrics: Arc<PublisherMetrics>,
    lost_tx: mpsc::UnboundedSender<String>,
}

impl EventHandler {
    fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { code } => {
                info!(code, "Connected with result code {}", code);
                observability::record_connection_event("connected");
            }
            TransportEvent::ConnectionLost { reason } => {
                warn!(reason = %reason, "connection lost");
                self.metrics.inc_connection_losses();
                observability::record_connection_event("lost");
                if self.lost_tx.send(reason).is_err() {
                    debug!("supervisor stopped, reconnect skipped");
                }
            }
            TransportEvent::PublishAck(ack) => self.on_ack(ack),
        }
    }

    fn on_ack(&self, ack: PublishAck) {
        let success = ack.outcome.success;
        observability::record_publish_ack(&ack.topic, success);

        if ack.topic != self.video_topic {
            debug!(topic = %ack.topic, message_id = ack.message_id, success, "non-video ack");
            return;
        }
        self.metrics.record_ack(success);
        self.window.record_ack(success);
        if success {
            debug!(message_id = ack.message_id, "frame delivered");
        } else {
            warn!(
                message_id = ack.message_id,
                code = ack.outcome.code,
                "frame delivery failed"
            );
        }
    }
}
