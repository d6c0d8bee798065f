//! The telemetry frame and its partial-update form.
//!
//! Only one [`TelemetryFrame`] is ever kept: the latest known reading. Each
//! ingest request carries a [`FramePatch`]; fields present in the patch
//! overwrite the stored value, absent fields keep it. Presence is decided by
//! the key being in the payload, never by the value being truthy, so `false`,
//! `0` and `""` are real updates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;

/// Latest known state of every monitored sensor and actuator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    /// Air temperature.
    pub temperature: f64,
    /// Relative humidity.
    pub humidity: f64,
    /// Ambient light level.
    pub light: f64,
    /// Tank water level.
    pub water_level: f64,
    /// Whether the fan is running.
    pub fan_status: bool,
    /// Whether the grow LED is lit.
    pub led_status: bool,
    /// Free-form tank state reported by the node (e.g. `"Full"`).
    pub tank_status: String,
    /// Whether the pump is running.
    pub pump_status: bool,
}

impl TelemetryFrame {
    /// Overwrite every field present in `patch`.
    pub fn apply(&mut self, patch: &FramePatch) {
        if let Some(v) = patch.temperature {
            self.temperature = v;
        }
        if let Some(v) = patch.humidity {
            self.humidity = v;
        }
        if let Some(v) = patch.light {
            self.light = v;
        }
        if let Some(v) = patch.water_level {
            self.water_level = v;
        }
        if let Some(v) = patch.fan_status {
            self.fan_status = v;
        }
        if let Some(v) = patch.led_status {
            self.led_status = v;
        }
        if let Some(v) = &patch.tank_status {
            self.tank_status.clone_from(v);
        }
        if let Some(v) = patch.pump_status {
            self.pump_status = v;
        }
    }

    /// Return a copy of this frame with `patch` applied.
    #[must_use]
    pub fn merged(&self, patch: &FramePatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

/// Partial frame sent by the producer.
///
/// A missing key and an explicit `null` both mean "not reported". Keys
/// outside the frame shape are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FramePatch {
    /// New temperature, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// New humidity, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// New light level, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<f64>,
    /// New water level, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
    /// New fan state, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_status: Option<bool>,
    /// New LED state, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_status: Option<bool>,
    /// New tank state, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tank_status: Option<String>,
    /// New pump state, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<bool>,
}

impl FramePatch {
    /// Parse a raw request body.
    ///
    /// The body must be a JSON object; arrays and scalars are rejected even
    /// though serde would happily read an array as a struct.
    pub fn from_json(body: &[u8]) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(FrameError::Validation(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
