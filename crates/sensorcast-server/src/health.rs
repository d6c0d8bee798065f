//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use sensorcast_core::TelemetryFrame;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Always `"healthy"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime: u64,
    /// Last ingest (or process start), RFC 3339 UTC with milliseconds.
    pub last_activity: String,
    /// Registered event streams.
    pub connected_clients: usize,
    /// Current frame.
    pub last_data: TelemetryFrame,
}

/// Build a health report from live state.
pub fn health_check(
    start_time: Instant,
    last_activity: DateTime<Utc>,
    connected_clients: usize,
    last_data: TelemetryFrame,
) -> HealthReport {
    HealthReport {
        status: "healthy".into(),
        uptime: start_time.elapsed().as_secs(),
        last_activity: last_activity.to_rfc3339_opts(SecondsFormat::Millis, true),
        connected_clients,
        last_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_is_healthy() {
        let resp = health_check(Instant::now(), Utc::now(), 0, TelemetryFrame::default());
        assert_eq!(resp.status, "healthy");
        assert!(resp.uptime < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, Utc::now(), 0, TelemetryFrame::default());
        assert!(resp.uptime >= 59);
    }

    #[test]
    fn last_activity_has_millisecond_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::milliseconds(89);
        let resp = health_check(Instant::now(), at, 0, TelemetryFrame::default());
        assert_eq!(resp.last_activity, "2026-03-04T05:06:07.089Z");
    }

    #[test]
    fn serialization_uses_camel_case() {
        let frame = TelemetryFrame {
            pump_status: true,
            ..TelemetryFrame::default()
        };
        let resp = health_check(Instant::now(), Utc::now(), 3, frame);
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "healthy");
        assert_eq!(parsed["connectedClients"], 3);
        assert!(parsed["uptime"].is_u64());
        assert!(parsed["lastActivity"].as_str().unwrap().ends_with('Z'));
        assert_eq!(parsed["lastData"]["pumpStatus"], true);
    }
}
