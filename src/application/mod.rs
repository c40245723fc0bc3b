//! Application layer - Use cases and port interfaces
//!
//! Contains the recorder and player components and the trait
//! definitions for the platform media primitives they drive.

mod metering;
pub mod player;
pub mod ports;
pub mod recorder;

// Re-export use cases
pub use player::{EndedCallback, Player};
pub use recorder::Recorder;
