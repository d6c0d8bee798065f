//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may name any subset of fields and the rest keep their defaults.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "broadcast": { "sendTimeoutMs": 500 },
///   "stats": { "enabled": true, "intervalSecs": 30 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorcastSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Fan-out tuning.
    pub broadcast: BroadcastSettings,
    /// Periodic stats logging.
    pub stats: StatsSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SensorcastSettings {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.broadcast.queue_depth == 0 {
            return Err(SettingsError::InvalidValue(
                "broadcast.queueDepth must be at least 1".into(),
            ));
        }
        if self.broadcast.send_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "broadcast.sendTimeoutMs must be at least 1".into(),
            ));
        }
        if self.stats.enabled && self.stats.interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "stats.intervalSecs must be at least 1 when stats are enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Per-subscriber delivery settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastSettings {
    /// Frames buffered per subscriber before a delivery has to wait.
    pub queue_depth: usize,
    /// How long one delivery may wait on a full queue before the
    /// subscriber is evicted.
    pub send_timeout_ms: u64,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            queue_depth: 32,
            send_timeout_ms: 250,
        }
    }
}

/// Periodic stats logging.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSettings {
    /// Whether the stats logger runs.
    pub enabled: bool,
    /// Seconds between two stats lines.
    pub interval_secs: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SensorcastSettings::default();
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.broadcast.queue_depth, 32);
        assert_eq!(s.broadcast.send_timeout_ms, 250);
        assert!(!s.stats.enabled);
        assert_eq!(s.stats.interval_secs, 60);
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(SensorcastSettings::default()).unwrap();
        assert!(json["broadcast"].get("queueDepth").is_some());
        assert!(json["broadcast"].get("sendTimeoutMs").is_some());
        assert!(json["stats"].get("intervalSecs").is_some());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: SensorcastSettings =
            serde_json::from_str(r#"{"server": {"port": 8080}}"#).unwrap();
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.broadcast.queue_depth, 32);
    }

    #[test]
    fn zero_queue_depth_rejected() {
        let mut s = SensorcastSettings::default();
        s.broadcast.queue_depth = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn zero_send_timeout_rejected() {
        let mut s = SensorcastSettings::default();
        s.broadcast.send_timeout_ms = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_stats_interval_only_matters_when_enabled() {
        let mut s = SensorcastSettings::default();
        s.stats.interval_secs = 0;
        assert!(s.validate().is_ok());
        s.stats.enabled = true;
        assert!(s.validate().is_err());
    }
}
