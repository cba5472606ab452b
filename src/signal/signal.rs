//! Named publish/subscribe signals.
//!
//! A [`Signal`] fans a value out to every live [`Subscription`]. Subscribing
//! is explicit and so is leaving: call [`Subscription::unsubscribe`] or drop
//! the subscription.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Values buffered per subscriber before the slowest one starts lagging.
const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct Signal<T> {
    name: &'static str,
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { name, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            name: self.name,
            rx: self.tx.subscribe(),
        }
    }

    /// Delivers `value` to all current subscribers and returns how many got it.
    /// Dispatching with nobody listening is not an error.
    pub fn dispatch(&self, value: T) -> usize {
        let delivered = self.tx.send(value).unwrap_or(0);
        tracing::trace!(event = "signal.dispatch", signal = self.name, delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Debug)]
pub struct Subscription<T> {
    name: &'static str,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// Waits for the next value. Returns `None` once the signal is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        event = "signal.subscriber_lagged",
                        signal = self.name,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-dispatched value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        event = "signal.subscriber_lagged",
                        signal = self.name,
                        skipped
                    );
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything dispatched since the last read.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(self) {
        tracing::trace!(event = "signal.unsubscribe", signal = self.name);
    }
}
