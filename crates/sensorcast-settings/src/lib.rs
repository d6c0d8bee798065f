//! # sensorcast-settings
//!
//! Configuration for the sensorcast service, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`SensorcastSettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `PORT` and `SENSORCAST_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_settings, load_settings_from_path, load_settings_with, settings_path,
};
pub use types::*;
