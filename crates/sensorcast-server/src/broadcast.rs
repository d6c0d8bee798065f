//! Frame fan-out to registered subscribers.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use sensorcast_core::TelemetryFrame;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::metrics::{BROADCAST_DELIVERIES_TOTAL, BROADCAST_EVICTIONS_TOTAL};
use crate::registry::{Subscriber, SubscriberRegistry};

/// Why a single delivery failed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving stream is gone.
    #[error("subscriber stream closed")]
    Closed,
    /// The queue stayed full for the whole timeout.
    #[error("subscriber queue full for {0:?}")]
    TimedOut(Duration),
}

impl DeliveryError {
    /// Metric label / log classification.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Result of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    /// Subscribers whose queue accepted the frame.
    pub delivered: usize,
    /// Subscribers removed because delivery failed.
    pub evicted: usize,
}

/// Encode a frame to its wire form once, for sharing across subscribers.
pub fn encode_frame(frame: &TelemetryFrame) -> Result<Arc<str>, serde_json::Error> {
    serde_json::to_string(frame).map(Arc::from)
}

/// An encoded frame and the subscribers registered when it was encoded.
#[derive(Debug)]
pub struct PendingBroadcast {
    payload: Arc<str>,
    recipients: Vec<Subscriber>,
}

impl PendingBroadcast {
    /// Wire form of the frame.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Number of subscribers it will be offered to.
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }
}

/// Delivers encoded frames to every subscriber in a registry snapshot.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<SubscriberRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
        }
    }

    /// Per-delivery bound.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Encode `frame` and snapshot the registry without delivering.
    ///
    /// Synchronous so callers can run it inside their own critical section
    /// and [`send`](Self::send) after releasing it.
    pub fn prepare(&self, frame: &TelemetryFrame) -> Result<PendingBroadcast, ServiceError> {
        let payload = encode_frame(frame)?;
        Ok(PendingBroadcast {
            payload,
            recipients: self.registry.snapshot(),
        })
    }

    /// Deliver a prepared broadcast.
    pub async fn send(&self, pending: PendingBroadcast) -> BroadcastOutcome {
        self.deliver(pending.recipients, pending.payload).await
    }

    /// Encode `frame` and deliver it to everyone registered right now.
    pub async fn broadcast(&self, frame: &TelemetryFrame) -> Result<BroadcastOutcome, ServiceError> {
        let pending = self.prepare(frame)?;
        Ok(self.send(pending).await)
    }

    /// Deliver `payload` to `recipients` concurrently.
    ///
    /// Failed subscribers are evicted from the registry; the rest are
    /// unaffected.
    pub async fn deliver(&self, recipients: Vec<Subscriber>, payload: Arc<str>) -> BroadcastOutcome {
        if recipients.is_empty() {
            return BroadcastOutcome::default();
        }

        let timeout = self.send_timeout;
        let results = join_all(recipients.iter().map(|sub| {
            let payload = Arc::clone(&payload);
            async move { (sub, sub.deliver(payload, timeout).await) }
        }))
        .await;

        let mut outcome = BroadcastOutcome::default();
        for (sub, result) in results {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    warn!(
                        subscriber_id = %sub.id,
                        connected_ms = u64::try_from(sub.connected_for().as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "delivery failed, evicting subscriber"
                    );
                    metrics::counter!(BROADCAST_EVICTIONS_TOTAL, "reason" => e.reason()).increment(1);
                    if self.registry.remove(&sub.id) {
                        outcome.evicted += 1;
                    }
                }
            }
        }

        metrics::counter!(BROADCAST_DELIVERIES_TOTAL).increment(outcome.delivered as u64);
        debug!(
            recipients = recipients.len(),
            delivered = outcome.delivered,
            evicted = outcome.evicted,
            "broadcast frame"
        );
        outcome
    }
}
