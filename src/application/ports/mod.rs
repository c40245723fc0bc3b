//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod media;
pub mod playback;

// Re-export common types
pub use capture::{CapturePlatform, ChunkSink, LevelAnalyser, MediaEncoder, MicrophoneStream};
pub use config::ConfigStore;
pub use media::MediaError;
pub use playback::{PlaybackElement, PlaybackEvent, PlaybackEvents, PlaybackPlatform};
pub use crate::domain::recording::CodecSupport;
