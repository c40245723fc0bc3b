//! Playback domain: state machine, progress, and the audio payload value object.

pub mod payload;
pub mod progress;
pub mod state;

pub use payload::AudioPayload;
pub use progress::playback_progress;
pub use state::{PlayerEvent, PlayerState};
