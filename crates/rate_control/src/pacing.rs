//! Pacing channel - single writer / single reader capture rate.
//!
//! Backed by `tokio::sync::watch`: the reader always sees a whole value and
//! only the latest one.

use std::time::Duration;

use tokio::sync::watch;

/// Create a pacing channel seeded with `initial_hz`
pub fn pacing_channel(initial_hz: f64) -> (PacingSender, PacingReceiver) {
    let (tx, rx) = watch::channel(initial_hz);
    (PacingSender { tx }, PacingReceiver { rx })
}

/// Convert a rate to the minimum time between captures
pub fn interval_for(rate_hz: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rate_hz).unwrap_or(Duration::MAX)
}

/// Writer side, owned by the rate controller
#[derive(Debug)]
pub struct PacingSender {
    tx: watch::Sender<f64>,
}

impl PacingSender {
    /// Publish a new capture rate
    pub fn set_rate(&self, rate_hz: f64) {
        self.tx.send_replace(rate_hz);
    }

    /// Last published rate
    pub fn rate_hz(&self) -> f64 {
        *self.tx.borrow()
    }

    /// Create an additional reader
    pub fn subscribe(&self) -> PacingReceiver {
        PacingReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Reader side, owned by the capture loop
#[derive(Debug, Clone)]
pub struct PacingReceiver {
    rx: watch::Receiver<f64>,
}

impl PacingReceiver {
    /// Current capture rate
    pub fn rate_hz(&self) -> f64 {
        *self.rx.borrow()
    }

    /// Current pacing interval (`1 / rate`)
    pub fn interval(&self) -> Duration {
        interval_for(self.rate_hz())
    }

    /// Wait until the rate changes
    ///
    /// Never resolves once the sender is gone, so it is safe inside `select!`.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_for() {
        assert_eq!(interval_for(10.0), Duration::from_millis(100));
        assert_eq!(interval_for(5.0), Duration::from_millis(200));
        assert_eq!(interval_for(0.0), Duration::MAX);
    }

    #[tokio::test]
    async fn test_latest_value_wins() {
        let (tx, mut rx) = pacing_channel(10.0);
        assert_eq!(rx.rate_hz(), 10.0);

        tx.set_rate(11.0);
        tx.set_rate(12.0);
        rx.changed().await;
        assert_eq!(rx.rate_hz(), 12.0);
        assert_eq!(rx.interval(), interval_for(12.0));
    }

    #[tokio::test]
    async fn test_changed_pends_after_sender_dropped() {
        let (tx, mut rx) = pacing_channel(10.0);
        drop(tx);

        let result =
            tokio::time::timeout(Duration::from_millis(20), rx.changed()).await;
        assert!(result.is_err());
        assert_eq!(rx.rate_hz(), 10.0);
    }
}
