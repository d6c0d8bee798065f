//! # sensorcast-server
//!
//! Axum HTTP server that fans telemetry out to dashboards.
//!
//! - `POST /sensor-data`: merge a producer frame and broadcast it
//! - `GET /events`: server-sent event stream, current frame first
//! - `GET /health`: uptime, subscriber count, last activity, last frame
//! - `GET /metrics`: Prometheus exposition
//!
//! [`BroadcastService`] owns the latest frame and the subscriber registry;
//! every endpoint reaches it through [`AppState`].

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod sse;
pub mod stats;

pub use broadcast::{BroadcastOutcome, Broadcaster, DeliveryError, PendingBroadcast};
pub use config::ServerConfig;
pub use errors::ServiceError;
pub use health::HealthReport;
pub use registry::{Subscriber, SubscriberRegistry};
pub use server::{AppState, SensorcastServer, ServerHandle};
pub use service::{BroadcastService, IngestReceipt, Subscription};
pub use shutdown::{DrainReport, ShutdownSignal};
