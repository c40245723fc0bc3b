//! Domain error types

use thiserror::Error;

/// Broad classification of a [`VoiceError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Microphone access refused; recoverable by user action
    PermissionDenied,
    /// No capture device present
    DeviceAbsent,
    /// The platform refused to open or finalize the capture pipeline
    Acquisition,
    /// Audio could not be decoded or played
    Playback,
    /// Input rejected before any resource was touched
    MalformedInput,
    /// The operation was superseded or cancelled by the caller
    Cancelled,
}

/// User-facing errors published by the recorder and the player.
///
/// The `Display` text is what the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("Microphone access was denied. Allow microphone access and try again.")]
    PermissionDenied,

    #[error("No microphone was found. Connect a microphone and try again.")]
    DeviceNotFound,

    #[error("Could not start recording: {0}")]
    StartFailed(String),

    #[error("Recording failed unexpectedly: {0}")]
    Unexpected(String),

    #[error("Could not finish recording: {0}")]
    EncodingFailed(String),

    #[error("Recording was cancelled")]
    Cancelled,

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Could not load audio: {0}")]
    LoadFailed(String),

    #[error("Invalid audio data: {0}")]
    InvalidAudioData(String),
}

impl VoiceError {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::DeviceNotFound => ErrorKind::DeviceAbsent,
            Self::StartFailed(_) | Self::Unexpected(_) | Self::EncodingFailed(_) => {
                ErrorKind::Acquisition
            }
            Self::Cancelled => ErrorKind::Cancelled,
            Self::PlaybackFailed(_) | Self::LoadFailed(_) => ErrorKind::Playback,
            Self::InvalidAudioData(_) => ErrorKind::MalformedInput,
        }
    }
}

/// Error when a state machine is asked to do something its current state forbids
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid state transition: cannot {action} while {state}")]
pub struct InvalidStateTransition {
    pub state: &'static str,
    pub action: &'static str,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_share_a_kind() {
        assert_eq!(
            VoiceError::StartFailed("x".into()).kind(),
            ErrorKind::Acquisition
        );
        assert_eq!(
            VoiceError::Unexpected("x".into()).kind(),
            ErrorKind::Acquisition
        );
        assert_eq!(
            VoiceError::EncodingFailed("x".into()).kind(),
            ErrorKind::Acquisition
        );
    }

    #[test]
    fn permission_and_device_messages_are_distinct() {
        let denied = VoiceError::PermissionDenied.to_string();
        let missing = VoiceError::DeviceNotFound.to_string();
        assert_ne!(denied, missing);
        assert!(denied.contains("denied"));
        assert!(missing.contains("No microphone"));
    }

    #[test]
    fn transition_error_display() {
        let err = InvalidStateTransition {
            state: "idle",
            action: "pause",
        };
        assert_eq!(
            err.to_string(),
            "Invalid state transition: cannot pause while idle"
        );
    }

    #[test]
    fn playback_kinds() {
        assert_eq!(
            VoiceError::LoadFailed("bad".into()).kind(),
            ErrorKind::Playback
        );
        assert_eq!(
            VoiceError::InvalidAudioData("bad".into()).kind(),
            ErrorKind::MalformedInput
        );
    }
}
