//! Server configuration.

use std::time::Duration;

use sensorcast_settings::SensorcastSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`SensorcastServer`](crate::SensorcastServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Frames buffered per subscriber.
    pub queue_depth: usize,
    /// Upper bound on one per-subscriber delivery, in milliseconds.
    pub send_timeout_ms: u64,
    /// Stats logging period; `None` disables the logger.
    pub stats_interval_secs: Option<u64>,
    /// How long shutdown waits for background tasks.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            queue_depth: 32,
            send_timeout_ms: 250,
            stats_interval_secs: None,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    pub fn from_settings(settings: &SensorcastSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            queue_depth: settings.broadcast.queue_depth,
            send_timeout_ms: settings.broadcast.send_timeout_ms,
            stats_interval_secs: settings
                .stats
                .enabled
                .then_some(settings.stats.interval_secs),
            ..Self::default()
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-subscriber delivery bound.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Stats logging period, if enabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        self.stats_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Shutdown drain bound.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.queue_depth, 32);
        assert_eq!(cfg.send_timeout(), Duration::from_millis(250));
        assert!(cfg.stats_interval().is_none());
    }

    #[test]
    fn bind_addr_format() {
        let cfg = ServerConfig {
            host: "0.0.0.0".into(),
            port: 3000,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn from_settings_maps_every_section() {
        let mut settings = SensorcastSettings::default();
        settings.server.port = 8080;
        settings.broadcast.queue_depth = 4;
        settings.broadcast.send_timeout_ms = 75;
        settings.stats.enabled = true;
        settings.stats.interval_secs = 15;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.queue_depth, 4);
        assert_eq!(cfg.send_timeout(), Duration::from_millis(75));
        assert_eq!(cfg.stats_interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn disabled_stats_have_no_interval() {
        let settings = SensorcastSettings::default();
        let cfg = ServerConfig::from_settings(&settings);
        assert!(cfg.stats_interval().is_none());
    }

    #[test]
    fn zero_interval_disables_stats() {
        let cfg = ServerConfig {
            stats_interval_secs: Some(0),
            ..ServerConfig::default()
        };
        assert!(cfg.stats_interval().is_none());
    }
}
