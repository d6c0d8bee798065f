//! Registry of connected observer streams.
//!
//! The registry is the single serialization point for subscriber mutation.
//! Broadcasts iterate a [`snapshot`](SubscriberRegistry::snapshot) taken
//! under the same lock, so a concurrent add or remove never tears an
//! iteration in progress.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sensorcast_core::SubscriberId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::broadcast::DeliveryError;
use crate::errors::ServiceError;
use crate::metrics::{SSE_CONNECTIONS_ACTIVE, SSE_CONNECTIONS_TOTAL};

/// One registered observer: its id and the sending half of its queue.
#[derive(Clone, Debug)]
pub struct Subscriber {
    /// Registry key.
    pub id: SubscriberId,
    tx: mpsc::Sender<Arc<str>>,
    connected_at: Instant,
}

impl Subscriber {
    /// Wrap a queue sender.
    pub fn new(id: SubscriberId, tx: mpsc::Sender<Arc<str>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
        }
    }

    /// Queue one encoded event, waiting at most `timeout` for room.
    pub async fn deliver(&self, payload: Arc<str>, timeout: Duration) -> Result<(), DeliveryError> {
        match self.tx.send_timeout(payload, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(_)) => Err(DeliveryError::Closed),
            Err(SendTimeoutError::Timeout(_)) => Err(DeliveryError::TimedOut(timeout)),
        }
    }

    /// How long ago the observer connected.
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Map of live subscribers keyed by id.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue sender under a freshly allocated id.
    pub fn add(&self, tx: mpsc::Sender<Arc<str>>) -> Result<SubscriberId, ServiceError> {
        self.insert(Subscriber::new(SubscriberId::new(), tx))
    }

    /// Register a subscriber under its own id.
    ///
    /// Fails with [`ServiceError::RegistryCollision`] if that id is live,
    /// leaving the existing entry untouched.
    pub fn insert(&self, subscriber: Subscriber) -> Result<SubscriberId, ServiceError> {
        let mut subscribers = self.subscribers.write();
        match subscribers.entry(subscriber.id.clone()) {
            Entry::Occupied(entry) => Err(ServiceError::RegistryCollision(entry.key().clone())),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                let _ = entry.insert(subscriber);
                metrics::counter!(SSE_CONNECTIONS_TOTAL).increment(1);
                record_active(subscribers.len());
                Ok(id)
            }
        }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn remove(&self, id: &SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let removed = subscribers.remove(id).is_some();
        if removed {
            record_active(subscribers.len());
        }
        removed
    }

    /// Point-in-time copy of every registered subscriber.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Number of registered subscribers.
    pub fn size(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.read().contains_key(id)
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(count: usize) {
    metrics::gauge!(SSE_CONNECTIONS_ACTIVE).set(count as f64);
}
