//! Playback platform backed by rodio
//!
//! Each element owns a thread holding the output stream and sink, since
//! `rodio::OutputStream` must stay on the thread that created it. The
//! element talks to it over a command channel and never blocks.

use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use log::debug;
use rodio::{Decoder, OutputStream, Sink, Source};

use crate::application::ports::{
    MediaError, PlaybackElement, PlaybackEvent, PlaybackEvents, PlaybackPlatform,
};
use crate::domain::config::PlaybackSettings;
use crate::domain::playback::AudioPayload;

use super::blob_store::BlobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Pause,
    Stop,
}

/// Playback platform using the default output device
#[derive(Debug, Clone, Default)]
pub struct RodioPlaybackPlatform {
    store: BlobStore,
    settings: PlaybackSettings,
}

impl RodioPlaybackPlatform {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            store: BlobStore::new(),
            settings,
        }
    }

    /// Object URLs created and not yet revoked
    pub fn live_urls(&self) -> usize {
        self.store.live_count()
    }
}

/// Handle to an element thread
pub struct RodioElement {
    commands: Sender<Command>,
    detached: bool,
}

impl PlaybackElement for RodioElement {
    fn play(&mut self) -> Result<(), MediaError> {
        if self.detached {
            return Err(MediaError::Internal("element is detached".into()));
        }
        self.commands
            .send(Command::Play)
            .map_err(|_| MediaError::Platform("audio output is no longer available".into()))
    }

    fn pause(&mut self) {
        if !self.detached {
            let _ = self.commands.send(Command::Pause);
        }
    }

    fn detach(&mut self) {
        if !self.detached {
            self.detached = true;
            let _ = self.commands.send(Command::Stop);
        }
    }
}

impl Drop for RodioElement {
    fn drop(&mut self) {
        self.detach();
    }
}

impl PlaybackPlatform for RodioPlaybackPlatform {
    type Element = RodioElement;

    fn create_object_url(&self, payload: &AudioPayload) -> Result<String, MediaError> {
        Ok(self.store.create(payload))
    }

    fn revoke_object_url(&self, url: &str) {
        self.store.revoke(url);
    }

    fn open_element(&self, url: &str, events: PlaybackEvents) -> Result<RodioElement, MediaError> {
        let payload = self
            .store
            .get(url)
            .ok_or_else(|| MediaError::Internal(format!("Unknown object URL: {}", url)))?;

        let (commands, receiver) = mpsc::channel();
        let settings = self.settings.clone();
        std::thread::Builder::new()
            .name("chat-voice-playback".into())
            .spawn(move || run_element(payload, settings, events, receiver))
            .map_err(|e| MediaError::Internal(format!("Failed to spawn playback thread: {}", e)))?;

        Ok(RodioElement {
            commands,
            detached: false,
        })
    }
}

/// Wall-clock playback position that stops while paused
#[derive(Debug, Default)]
struct PlaybackClock {
    elapsed: Duration,
    resumed_at: Option<Instant>,
}

impl PlaybackClock {
    fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(resumed_at) = self.resumed_at.take() {
            self.elapsed += resumed_at.elapsed();
        }
    }

    fn is_running(&self) -> bool {
        self.resumed_at.is_some()
    }

    fn position(&self) -> Duration {
        self.elapsed + self.resumed_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

fn run_element(
    payload: AudioPayload,
    settings: PlaybackSettings,
    events: PlaybackEvents,
    commands: Receiver<Command>,
) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            events.emit(PlaybackEvent::Error(e.to_string()));
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            events.emit(PlaybackEvent::Error(e.to_string()));
            return;
        }
    };
    let source = match Decoder::new(Cursor::new(payload.shared_data())) {
        Ok(source) => source,
        Err(e) => {
            events.emit(PlaybackEvent::Error(format!(
                "{} ({})",
                e,
                payload.content_type()
            )));
            return;
        }
    };

    let duration = source.total_duration();
    sink.pause();
    sink.set_volume(settings.volume);
    sink.append(source);
    debug!(
        "Decoded {} bytes of {} ({:?})",
        payload.len(),
        payload.content_type(),
        duration
    );
    events.emit(PlaybackEvent::Loaded);

    let mut clock = PlaybackClock::default();
    loop {
        match commands.recv_timeout(settings.time_update_interval) {
            Ok(Command::Play) => {
                sink.play();
                clock.resume();
            }
            Ok(Command::Pause) => {
                sink.pause();
                clock.pause();
            }
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                debug!("Playback element detached");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !clock.is_running() {
            continue;
        }

        if sink.empty() {
            let position = duration.unwrap_or_else(|| clock.position());
            events.emit(PlaybackEvent::TimeUpdate { position, duration });
            events.emit(PlaybackEvent::Ended);
            return;
        }

        let position = match duration {
            Some(total) => clock.position().min(total),
            None => clock.position(),
        };
        events.emit(PlaybackEvent::TimeUpdate { position, duration });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn clock_stops_while_paused() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.position(), Duration::ZERO);
        assert!(!clock.is_running());

        clock.resume();
        std::thread::sleep(Duration::from_millis(20));
        clock.pause();
        let paused_at = clock.position();
        assert!(paused_at >= Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), paused_at);
    }

    #[test]
    fn object_urls_are_revocable() {
        let platform = RodioPlaybackPlatform::default();
        let url = platform
            .create_object_url(&AudioPayload::new(vec![0; 8], "audio/wav"))
            .unwrap();
        assert_eq!(platform.live_urls(), 1);
        platform.revoke_object_url(&url);
        platform.revoke_object_url(&url);
        assert_eq!(platform.live_urls(), 0);
    }

    #[test]
    fn unknown_url_is_rejected() {
        let platform = RodioPlaybackPlatform::default();
        let result = platform.open_element("blob:chat-voice/404", PlaybackEvents::new(|_| {}));
        assert!(result.is_err());
    }

    #[test]
    fn detached_element_refuses_play() {
        let (commands, _receiver) = mpsc::channel();
        let mut element = RodioElement {
            commands,
            detached: false,
        };
        element.detach();
        assert!(element.play().is_err());
    }

    #[test]
    #[ignore = "Requires audio hardware"]
    fn garbage_reports_an_error() {
        let platform = RodioPlaybackPlatform::default();
        let url = platform
            .create_object_url(&AudioPayload::new(vec![1, 2, 3, 4], "audio/webm"))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _element = platform
            .open_element(&url, PlaybackEvents::new(move |e| sink.lock().unwrap().push(e)))
            .unwrap();

        std::thread::sleep(Duration::from_millis(500));
        let seen = seen.lock().unwrap();
        assert!(matches!(seen.first(), Some(PlaybackEvent::Error(_))));
    }
}
