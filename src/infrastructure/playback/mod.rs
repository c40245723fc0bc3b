//! Audio playback adapters

pub mod blob_store;
pub mod rodio_platform;

pub use blob_store::BlobStore;
pub use rodio_platform::{RodioElement, RodioPlaybackPlatform};
