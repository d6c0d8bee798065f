//! The broadcast service: latest frame, subscriber registry and fan-out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sensorcast_core::{FramePatch, SubscriberId, TelemetryFrame};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info};

use crate::broadcast::{encode_frame, BroadcastOutcome, Broadcaster};
use crate::config::ServerConfig;
use crate::errors::ServiceError;
use crate::health::{health_check, HealthReport};
use crate::registry::{Subscriber, SubscriberRegistry};

/// State mutated by ingest.
#[derive(Debug)]
struct IngestState {
    frame: TelemetryFrame,
    last_activity: DateTime<Utc>,
}

/// Result of a successful ingest.
#[derive(Clone, Debug)]
pub struct IngestReceipt {
    /// The frame after the merge.
    pub frame: TelemetryFrame,
    /// What the fan-out achieved.
    pub outcome: BroadcastOutcome,
}

/// A freshly registered subscriber and its event queue.
///
/// The current frame is already queued on `rx` when this is returned.
#[derive(Debug)]
pub struct Subscription {
    /// Registry key; pass to [`BroadcastService::unsubscribe`] on disconnect.
    pub id: SubscriberId,
    /// Encoded frames, oldest first.
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// Owns the latest frame and every connected subscriber.
///
/// Lock order is fan-out turn, then state, then registry. The state lock is
/// held only for synchronous work and never across an `.await`; the fan-out
/// turn is held from merge to the end of delivery so every subscriber
/// queues frames in merge order.
#[derive(Debug)]
pub struct BroadcastService {
    fanout: AsyncMutex<()>,
    state: Mutex<IngestState>,
    registry: Arc<SubscriberRegistry>,
    broadcaster: Broadcaster,
    queue_depth: usize,
    started_at: Instant,
}

impl BroadcastService {
    /// Create a service with the given per-subscriber queue depth and
    /// delivery bound.
    pub fn new(queue_depth: usize, send_timeout: Duration) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        Self {
            fanout: AsyncMutex::new(()),
            state: Mutex::new(IngestState {
                frame: TelemetryFrame::default(),
                last_activity: Utc::now(),
            }),
            broadcaster: Broadcaster::new(Arc::clone(&registry), send_timeout),
            registry,
            queue_depth: queue_depth.max(1),
            started_at: Instant::now(),
        }
    }

    /// Create a service from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.queue_depth, config.send_timeout())
    }

    /// Merge `patch` into the current frame and broadcast the result.
    ///
    /// The merge, activity stamp, encoding and registry snapshot happen in
    /// one critical section. Delivery runs after the state lock is released
    /// but before the next ingest may merge, so a subscriber's newest event
    /// is always the current frame.
    pub async fn ingest(&self, patch: &FramePatch) -> Result<IngestReceipt, ServiceError> {
        let _turn = self.fanout.lock().await;
        let (frame, pending) = {
            let mut state = self.state.lock();
            let merged = state.frame.merged(patch);
            let pending = self.broadcaster.prepare(&merged)?;
            state.frame = merged.clone();
            state.last_activity = Utc::now();
            (merged, pending)
        };

        let outcome = self.broadcaster.send(pending).await;
        info!(
            client_count = outcome.delivered,
            evicted = outcome.evicted,
            "telemetry frame broadcast"
        );
        Ok(IngestReceipt { frame, outcome })
    }

    /// Register a new subscriber with the current frame already queued.
    pub fn subscribe(&self) -> Result<Subscription, ServiceError> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let state = self.state.lock();
        let payload = encode_frame(&state.frame)?;
        tx.try_send(payload)
            .map_err(|e| ServiceError::Internal(format!("failed to queue initial frame: {e}")))?;
        let id = self.registry.insert(Subscriber::new(SubscriberId::new(), tx))?;
        drop(state);

        debug!(subscriber_id = %id, "subscriber registered");
        Ok(Subscription { id, rx })
    }

    /// Deregister a subscriber. Safe to call more than once.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            debug!(subscriber_id = %id, "subscriber removed");
        }
        removed
    }

    /// Snapshot of uptime, subscriber count, last activity and last frame.
    pub fn health(&self) -> HealthReport {
        let (frame, last_activity) = {
            let state = self.state.lock();
            (state.frame.clone(), state.last_activity)
        };
        health_check(self.started_at, last_activity, self.registry.size(), frame)
    }

    /// Copy of the current frame.
    pub fn current_frame(&self) -> TelemetryFrame {
        self.state.lock().frame.clone()
    }

    /// Time of the last ingest, or process start.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.state.lock().last_activity
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.size()
    }

    /// When the service was created.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// The subscriber registry.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}
