//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Build a handle without installing it globally (tests, embedding).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Ingest requests received (counter).
pub const INGEST_REQUESTS_TOTAL: &str = "ingest_requests_total";
/// Ingest requests rejected as invalid (counter).
pub const INGEST_REJECTED_TOTAL: &str = "ingest_rejected_total";
/// Frames handed to subscriber queues (counter).
pub const BROADCAST_DELIVERIES_TOTAL: &str = "broadcast_deliveries_total";
/// Subscribers evicted after a failed delivery (counter, labels: reason).
pub const BROADCAST_EVICTIONS_TOTAL: &str = "broadcast_evictions_total";
/// Event streams opened (counter).
pub const SSE_CONNECTIONS_TOTAL: &str = "sse_connections_total";
/// Event streams currently registered (gauge).
pub const SSE_CONNECTIONS_ACTIVE: &str = "sse_connections_active";
