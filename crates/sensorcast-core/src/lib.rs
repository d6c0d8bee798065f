//! # sensorcast-core
//!
//! Shared vocabulary for the sensorcast workspace:
//!
//! - **Frames**: [`TelemetryFrame`], the single latest reading, and
//!   [`FramePatch`], the partial update carried by one ingest request
//! - **Ids**: [`SubscriberId`], a time-ordered branded id per observer stream
//! - **Errors**: [`FrameError`] for payloads that cannot be merged

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod ids;

pub use errors::FrameError;
pub use frame::{FramePatch, TelemetryFrame};
pub use ids::SubscriberId;
