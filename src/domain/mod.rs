//! Domain layer - Core voice logic
//!
//! Contains the recorder and player state machines, value objects,
//! and domain errors. This layer has no dependencies on devices or I/O.

pub mod config;
pub mod error;
pub mod playback;
pub mod recording;

// Re-export common types
pub use config::{AppConfig, CaptureConstraints, CaptureSettings, PlaybackSettings};
pub use error::*;
pub use playback::{AudioPayload, PlayerState};
pub use recording::{Codec, EncodedClip, RecorderState};
