//! Configuration value objects

pub mod app_config;
pub mod settings;

pub use app_config::{AppConfig, CaptureConfig, PlaybackConfig};
pub use settings::{CaptureConstraints, CaptureSettings, PlaybackSettings};
