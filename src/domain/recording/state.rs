//! Recorder state machine

use std::fmt;

use crate::domain::error::InvalidStateTransition;

/// Recorder states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Processing,
}

/// Inputs that drive the recorder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Microphone, analyser and encoder are all open
    Acquired,
    /// Caller asked for the clip; the encoder is finalizing
    StopRequested,
    /// The encoder flushed its last chunk
    Finalized,
    /// Caller discarded the session
    Cancelled,
    /// Any classified failure
    Failed,
}

impl RecorderEvent {
    const fn action(&self) -> &'static str {
        match self {
            Self::Acquired => "start recording",
            Self::StopRequested => "stop recording",
            Self::Finalized => "finish processing",
            Self::Cancelled => "cancel recording",
            Self::Failed => "fail",
        }
    }
}

impl RecorderState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Processing => "processing",
        }
    }

    /// Apply an event, returning the next state.
    ///
    /// ```text
    ///   IDLE       -> RECORDING   (Acquired)
    ///   RECORDING  -> PROCESSING  (StopRequested)
    ///   PROCESSING -> IDLE        (Finalized)
    ///   *          -> IDLE        (Cancelled | Failed)
    /// ```
    pub fn on(self, event: RecorderEvent) -> Result<Self, InvalidStateTransition> {
        match (self, event) {
            (Self::Idle, RecorderEvent::Acquired) => Ok(Self::Recording),
            (Self::Recording, RecorderEvent::StopRequested) => Ok(Self::Processing),
            (Self::Processing, RecorderEvent::Finalized) => Ok(Self::Idle),
            (_, RecorderEvent::Cancelled | RecorderEvent::Failed) => Ok(Self::Idle),
            (state, event) => Err(InvalidStateTransition {
                state: state.as_str(),
                action: event.action(),
            }),
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
