//! Frame-level error types.

use thiserror::Error;

/// Errors raised while turning a producer payload into a [`FramePatch`].
///
/// [`FramePatch`]: crate::FramePatch
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload is not JSON, not an object, or a field has the wrong type.
    #[error("invalid telemetry payload: {0}")]
    Validation(String),
}

impl FrameError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
        }
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
