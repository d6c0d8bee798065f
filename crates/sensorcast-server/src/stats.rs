//! Periodic stats logging.

use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::service::BroadcastService;

/// Log subscriber count, uptime and last activity every `interval` until
/// `cancel` fires. Returns the number of reports written.
pub async fn run_stats_logger(
    service: Arc<BroadcastService>,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reports = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                info!(
                    client_count = service.subscriber_count(),
                    uptime_secs = service.started_at().elapsed().as_secs(),
                    last_activity = %service.last_activity().to_rfc3339_opts(SecondsFormat::Millis, true),
                    "broadcast stats"
                );
                reports += 1;
            }
            () = cancel.cancelled() => {
                return reports;
            }
        }
    }
}

/// Spawn [`run_stats_logger`] as a background task.
pub fn spawn_stats_logger(
    service: Arc<BroadcastService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reports = run_stats_logger(service, interval, cancel).await;
        info!(reports, "stats logger stopped");
    })
}
