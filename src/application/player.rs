//! Audio player use case

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::domain::error::VoiceError;
use crate::domain::playback::{playback_progress, AudioPayload, PlayerEvent, PlayerState};

use super::ports::{PlaybackElement, PlaybackEvent, PlaybackEvents, PlaybackPlatform};

/// Callback invoked once per naturally ended playback
pub type EndedCallback = Arc<dyn Fn() + Send + Sync>;

/// A local object URL. Dropping it revokes the URL.
struct TransientResource<P: PlaybackPlatform> {
    url: String,
    platform: Arc<P>,
}

impl<P: PlaybackPlatform> Drop for TransientResource<P> {
    fn drop(&mut self) {
        self.platform.revoke_object_url(&self.url);
        debug!("Revoked {}", self.url);
    }
}

/// An element bound to its source. Dropping pauses and detaches the
/// element, then revokes the source URL.
struct PlaybackSession<P: PlaybackPlatform> {
    id: u64,
    element: P::Element,
    // Declared after `element` so the URL outlives the element.
    resource: TransientResource<P>,
}

impl<P: PlaybackPlatform> Drop for PlaybackSession<P> {
    fn drop(&mut self) {
        self.element.pause();
        self.element.detach();
    }
}

struct PlayerCore<P: PlaybackPlatform> {
    state: PlayerState,
    session: Option<PlaybackSession<P>>,
    next_session: u64,
    error: Option<VoiceError>,
    progress: watch::Sender<f32>,
}

impl<P: PlaybackPlatform> PlayerCore<P> {
    fn apply(&mut self, event: PlayerEvent) -> bool {
        match self.state.on(event) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.session.as_ref().is_some_and(|session| session.id == id)
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                "Closing playback session {} ({})",
                session.id, session.resource.url
            );
        }
    }

    fn set_progress(&self, value: f32) {
        self.progress.send_replace(value);
    }

    /// Publish `value` unless it would move progress backwards
    fn advance_progress(&self, value: f32) {
        let current = *self.progress.borrow();
        if value > current {
            self.progress.send_replace(value);
        }
    }

    fn fail(&mut self, err: VoiceError) {
        warn!("{}", err);
        self.close_session();
        self.apply(PlayerEvent::Failed);
        self.error = Some(err);
        self.set_progress(0.0);
    }
}

struct PlayerShared<P: PlaybackPlatform> {
    platform: Arc<P>,
    core: Mutex<PlayerCore<P>>,
    on_ended: Mutex<Option<EndedCallback>>,
}

impl<P: PlaybackPlatform> PlayerShared<P> {
    fn lock_core(&self) -> MutexGuard<'_, PlayerCore<P>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ended_callback(&self) -> Option<EndedCallback> {
        self.on_ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route an element event into the state machine. Events from a
    /// superseded session are ignored.
    fn dispatch(&self, id: u64, event: PlaybackEvent) {
        let ended = {
            let mut core = self.lock_core();
            if !core.is_current(id) {
                debug!("Ignoring {:?} from stale playback session {}", event, id);
                return;
            }

            match event {
                PlaybackEvent::Loaded => {
                    if core.apply(PlayerEvent::Decoded) {
                        let started = core.session.as_mut().map(|s| s.element.play());
                        if let Some(Err(e)) = started {
                            core.fail(VoiceError::PlaybackFailed(e.to_string()));
                        }
                    }
                    false
                }
                PlaybackEvent::TimeUpdate { position, duration } => {
                    if let Some(progress) = playback_progress(position, duration) {
                        core.advance_progress(progress);
                    }
                    false
                }
                PlaybackEvent::Ended => {
                    core.set_progress(1.0);
                    core.close_session();
                    if !core.apply(PlayerEvent::Ended) {
                        core.apply(PlayerEvent::Stop);
                    }
                    info!("Playback finished");
                    true
                }
                PlaybackEvent::Error(reason) => {
                    core.fail(VoiceError::LoadFailed(reason));
                    false
                }
            }
        };

        if ended {
            if let Some(callback) = self.ended_callback() {
                callback();
            }
        }
    }
}

/// Plays encoded audio through a [`PlaybackPlatform`].
///
/// All operations are synchronous; decoding and playback proceed in the
/// platform and are reported back through element events.
pub struct Player<P: PlaybackPlatform> {
    shared: Arc<PlayerShared<P>>,
}

impl<P: PlaybackPlatform> Player<P> {
    pub fn new(platform: P) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            shared: Arc::new(PlayerShared {
                platform: Arc::new(platform),
                core: Mutex::new(PlayerCore {
                    state: PlayerState::Idle,
                    session: None,
                    next_session: 0,
                    error: None,
                    progress,
                }),
                on_ended: Mutex::new(None),
            }),
        }
    }

    /// Register the end-of-playback callback, replacing any previous one
    pub fn on_ended(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self
            .shared
            .on_ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn state(&self) -> PlayerState {
        self.shared.lock_core().state
    }

    pub fn error(&self) -> Option<VoiceError> {
        self.shared.lock_core().error.clone()
    }

    /// Playback position over duration in `[0, 1]`
    pub fn progress(&self) -> f32 {
        *self.shared.lock_core().progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.shared.lock_core().progress.subscribe()
    }

    /// Decode base64 audio and play it.
    ///
    /// Malformed input closes any open session and fails with
    /// [`VoiceError::InvalidAudioData`] without opening a new one.
    pub fn play(&self, encoded: &str, content_type: &str) -> Result<(), VoiceError> {
        match AudioPayload::from_base64(encoded, content_type) {
            Ok(payload) => self.play_blob(payload),
            Err(err) => {
                self.shared.lock_core().fail(err.clone());
                Err(err)
            }
        }
    }

    /// Play `payload`, replacing any open session
    pub fn play_blob(&self, payload: AudioPayload) -> Result<(), VoiceError> {
        let mut core = self.shared.lock_core();
        core.close_session();
        core.apply(PlayerEvent::Load);
        core.error = None;
        core.set_progress(0.0);

        core.next_session += 1;
        let id = core.next_session;

        match self.open_session(id, &payload) {
            Ok(session) => {
                info!(
                    "Loading {} bytes of {} (session {})",
                    payload.len(),
                    payload.content_type(),
                    id
                );
                core.session = Some(session);
                Ok(())
            }
            Err(err) => {
                core.fail(err.clone());
                Err(err)
            }
        }
    }

    fn open_session(&self, id: u64, payload: &AudioPayload) -> Result<PlaybackSession<P>, VoiceError> {
        let platform = &self.shared.platform;
        let url = platform
            .create_object_url(payload)
            .map_err(|e| VoiceError::PlaybackFailed(e.to_string()))?;
        let resource = TransientResource {
            url,
            platform: Arc::clone(platform),
        };

        let shared: Weak<PlayerShared<P>> = Arc::downgrade(&self.shared);
        let events = PlaybackEvents::new(move |event| {
            if let Some(shared) = shared.upgrade() {
                shared.dispatch(id, event);
            }
        });

        let element = platform
            .open_element(&resource.url, events)
            .map_err(|e| VoiceError::PlaybackFailed(e.to_string()))?;

        Ok(PlaybackSession {
            id,
            element,
            resource,
        })
    }

    /// Pause. No-op unless playing.
    pub fn pause(&self) {
        let mut core = self.shared.lock_core();
        if core.state != PlayerState::Playing {
            return;
        }
        if let Some(session) = core.session.as_mut() {
            session.element.pause();
        }
        core.apply(PlayerEvent::Pause);
    }

    /// Resume. No-op unless paused.
    pub fn resume(&self) {
        let mut core = self.shared.lock_core();
        if core.state != PlayerState::Paused {
            return;
        }
        match core.session.as_mut().map(|s| s.element.play()) {
            Some(Err(e)) => core.fail(VoiceError::PlaybackFailed(e.to_string())),
            _ => {
                core.apply(PlayerEvent::Resume);
            }
        }
    }

    /// Close the open session, reset progress and return to idle. Safe in
    /// any state.
    pub fn stop(&self) {
        let mut core = self.shared.lock_core();
        core.close_session();
        core.apply(PlayerEvent::Stop);
        core.set_progress(0.0);
    }
}

impl<P: PlaybackPlatform> Drop for Player<P> {
    fn drop(&mut self) {
        self.shared.lock_core().close_session();
    }
}
