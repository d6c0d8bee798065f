//! `SensorcastServer`: Axum HTTP server with SSE fan-out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use metrics_exporter_prometheus::PrometheusHandle;
use sensorcast_core::{FramePatch, TelemetryFrame};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::{panic_response, route_not_found, ServiceError};
use crate::health::HealthReport;
use crate::metrics::{INGEST_REJECTED_TOTAL, INGEST_REQUESTS_TOTAL};
use crate::service::BroadcastService;
use crate::shutdown::ShutdownSignal;
use crate::sse::EventStream;
use crate::stats::spawn_stats_logger;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Latest frame and subscriber registry.
    pub service: Arc<BroadcastService>,
    /// Stop signal; its token ends every event stream.
    pub shutdown: Arc<ShutdownSignal>,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Successful ingest response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Always `true`.
    pub success: bool,
    /// Subscribers that received the frame.
    pub client_count: usize,
    /// The frame after the merge.
    pub processed_data: TelemetryFrame,
}

/// The sensorcast server.
pub struct SensorcastServer {
    config: ServerConfig,
    service: Arc<BroadcastService>,
    shutdown: Arc<ShutdownSignal>,
    metrics: PrometheusHandle,
}

impl SensorcastServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            service: Arc::new(BroadcastService::from_config(&config)),
            shutdown: Arc::new(ShutdownSignal::new()),
            config,
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            service: Arc::clone(&self.service),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/sensor-data", post(ingest_handler))
            .route("/events", get(events_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback(route_not_found)
            .method_not_allowed_fallback(route_not_found)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and start serving.
    pub async fn start(self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.start_on(listener).await
    }

    /// Start serving on an already-bound listener.
    pub async fn start_on(self, listener: TcpListener) -> std::io::Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let mut tasks = Vec::with_capacity(2);
        tasks.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server exited with error");
            }
        }));

        if let Some(interval) = self.config.stats_interval() {
            tasks.push(spawn_stats_logger(
                Arc::clone(&self.service),
                interval,
                self.shutdown.token(),
            ));
        }

        info!(
            addr = %local_addr,
            queue_depth = self.config.queue_depth,
            send_timeout_ms = self.config.send_timeout_ms,
            "sensorcast server started"
        );

        Ok(ServerHandle {
            local_addr,
            service: self.service,
            shutdown: self.shutdown,
            tasks,
            timeout: self.config.shutdown_timeout(),
        })
    }

    /// Get the broadcast service.
    pub fn service(&self) -> &Arc<BroadcastService> {
        &self.service
    }

    /// Get the stop signal.
    pub fn shutdown(&self) -> &Arc<ShutdownSignal> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Handle to a running server; keeps its background tasks alive.
pub struct ServerHandle {
    local_addr: SocketAddr,
    service: Arc<BroadcastService>,
    shutdown: Arc<ShutdownSignal>,
    tasks: Vec<JoinHandle<()>>,
    timeout: Duration,
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The running broadcast service.
    pub fn service(&self) -> &Arc<BroadcastService> {
        &self.service
    }

    /// Signal shutdown and wait for the server and background tasks.
    pub async fn shutdown(self) {
        info!(
            client_count = self.service.subscriber_count(),
            "shutting down sensorcast server"
        );
        let report = self.shutdown.drain(self.tasks, self.timeout).await;
        if report.is_clean() {
            info!(tasks = report.completed, "sensorcast server stopped");
        } else {
            warn!(
                completed = report.completed,
                panicked = report.panicked,
                aborted = report.aborted.len(),
                "sensorcast server stopped uncleanly"
            );
        }
    }
}

/// POST /sensor-data
async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ServiceError> {
    metrics::counter!(INGEST_REQUESTS_TOTAL).increment(1);
    let patch = FramePatch::from_json(&body).inspect_err(|_| {
        metrics::counter!(INGEST_REJECTED_TOTAL).increment(1);
    })?;

    let receipt = state.service.ingest(&patch).await?;
    Ok(Json(IngestResponse {
        success: true,
        client_count: receipt.outcome.delivered,
        processed_data: receipt.frame,
    }))
}

/// GET /events
async fn events_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let subscription = state.service.subscribe()?;
    info!(
        subscriber_id = %subscription.id,
        client_count = state.service.subscriber_count(),
        "event stream opened"
    );

    let stream = EventStream::new(
        Arc::clone(&state.service),
        subscription,
        state.shutdown.token(),
    );
    Ok(([(header::CONNECTION, "keep-alive")], Sse::new(stream)))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
