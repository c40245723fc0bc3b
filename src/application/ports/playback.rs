//! Playback port interfaces

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::playback::AudioPayload;

use super::media::MediaError;

/// Callbacks a playback element reports to the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// First frame decoded; playback can start
    Loaded,
    /// Playback position changed
    TimeUpdate {
        position: Duration,
        duration: Option<Duration>,
    },
    /// Playback reached the end of the resource
    Ended,
    /// Decode or output failure
    Error(String),
}

/// Channel through which an element delivers its [`PlaybackEvent`]s.
///
/// Elements may emit from any thread, but never from inside a call the
/// player makes on the element.
#[derive(Clone)]
pub struct PlaybackEvents {
    deliver: Arc<dyn Fn(PlaybackEvent) + Send + Sync>,
}

impl PlaybackEvents {
    pub fn new(deliver: impl Fn(PlaybackEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn emit(&self, event: PlaybackEvent) {
        (self.deliver)(event)
    }
}

impl fmt::Debug for PlaybackEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEvents").finish_non_exhaustive()
    }
}

/// A playable element bound to one source
pub trait PlaybackElement: Send + 'static {
    /// Start or resume playback; `Err` if the platform refuses
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self);

    /// Detach the source. No events are emitted afterwards.
    fn detach(&mut self);
}

/// Platform collaborator that creates transient resources and elements
pub trait PlaybackPlatform: Send + Sync + 'static {
    type Element: PlaybackElement;

    /// Register `payload` and return a revocable local URL for it
    fn create_object_url(&self, payload: &AudioPayload) -> Result<String, MediaError>;

    /// Release a URL returned by [`create_object_url`](Self::create_object_url).
    /// Revoking an unknown URL is a no-op.
    fn revoke_object_url(&self, url: &str);

    /// Bind a new element to `url`; decoding proceeds in the background and
    /// is reported through `events`
    fn open_element(&self, url: &str, events: PlaybackEvents) -> Result<Self::Element, MediaError>;
}
