//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with cpal, rodio and the XDG config directory.

pub mod capture;
pub mod config;
pub mod devices;
pub mod playback;

// Re-export adapters
pub use capture::CpalCapturePlatform;
pub use config::XdgConfigStore;
pub use devices::{list_devices, AudioDevice, DeviceDirection};
pub use playback::RodioPlaybackPlatform;
