//! Errors reported by platform media primitives

use thiserror::Error;

/// Failure reported by a capture or playback platform.
///
/// The first three variants carry the platform's own denial reason; the
/// recorder classifies them into user-facing messages. `Internal` covers
/// anything that did not come from the platform itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("Permission denied: {0}")]
    NotAllowed(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Platform(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
