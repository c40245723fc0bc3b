//! Player state machine

use std::fmt;

use crate::domain::error::InvalidStateTransition;

/// Player states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Inputs that drive the player state machine.
///
/// Platform callbacks (first frame decoded, natural end, decode error) map
/// onto these one-to-one; caller operations map onto the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Load,
    Decoded,
    Pause,
    Resume,
    Ended,
    Failed,
    Stop,
}

impl PlayerEvent {
    const fn action(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Decoded => "start playback",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Ended => "end playback",
            Self::Failed => "fail",
            Self::Stop => "stop",
        }
    }
}

impl PlayerState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }

    /// Whether a playback session is considered open in this state
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Apply an event, returning the next state.
    ///
    /// ```text
    ///   *        -> LOADING  (Load)
    ///   LOADING  -> PLAYING  (Decoded)
    ///   PLAYING  -> PAUSED   (Pause)
    ///   PAUSED   -> PLAYING  (Resume)
    ///   PLAYING  -> IDLE     (Ended)
    ///   *        -> IDLE     (Failed | Stop)
    /// ```
    pub fn on(self, event: PlayerEvent) -> Result<Self, InvalidStateTransition> {
        match (self, event) {
            (_, PlayerEvent::Load) => Ok(Self::Loading),
            (Self::Loading, PlayerEvent::Decoded) => Ok(Self::Playing),
            (Self::Playing, PlayerEvent::Pause) => Ok(Self::Paused),
            (Self::Paused, PlayerEvent::Resume) => Ok(Self::Playing),
            (Self::Playing, PlayerEvent::Ended) => Ok(Self::Idle),
            (_, PlayerEvent::Failed | PlayerEvent::Stop) => Ok(Self::Idle),
            (state, event) => Err(InvalidStateTransition {
                state: state.as_str(),
                action: event.action(),
            }),
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
