//! Scripted capture and playback platforms shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use chat_voice::application::ports::{
    CapturePlatform, ChunkSink, CodecSupport, LevelAnalyser, MediaEncoder, MediaError,
    MicrophoneStream, PlaybackElement, PlaybackEvent, PlaybackEvents, PlaybackPlatform,
};
use chat_voice::domain::config::CaptureConstraints;
use chat_voice::domain::playback::AudioPayload;
use chat_voice::domain::recording::Codec;

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Counts of capture resources currently held open
#[derive(Default)]
pub struct CaptureTracker {
    pub open_streams: AtomicUsize,
    pub open_analysers: AtomicUsize,
    pub open_encoders: AtomicUsize,
    pub microphone_requests: AtomicUsize,
    /// Byte every analyser bin reports
    pub bin_level: AtomicU8,
    sink: Mutex<Option<ChunkSink>>,
}

impl CaptureTracker {
    pub fn open_resources(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
            + self.open_analysers.load(Ordering::SeqCst)
            + self.open_encoders.load(Ordering::SeqCst)
    }

    /// Emit one encoder chunk of `len` bytes filled with `fill`
    pub fn emit_chunk(&self, len: usize, fill: u8) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.push(vec![fill; len]),
            None => false,
        }
    }
}

pub struct FakeStream {
    tracker: Arc<CaptureTracker>,
    live: bool,
}

impl MicrophoneStream for FakeStream {
    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.tracker.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

pub struct FakeAnalyser {
    tracker: Arc<CaptureTracker>,
    open: bool,
}

impl LevelAnalyser for FakeAnalyser {
    fn frequency_bin_count(&self) -> usize {
        16
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        let level = if self.open {
            self.tracker.bin_level.load(Ordering::SeqCst)
        } else {
            0
        };
        bins.fill(level);
    }

    fn close(&mut self) -> Result<(), MediaError> {
        if self.open {
            self.open = false;
            self.tracker.open_analysers.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct FakeEncoder {
    tracker: Arc<CaptureTracker>,
    open: bool,
    fail_finish: bool,
    stall_finish: bool,
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    fn start(&mut self, _timeslice: Duration) -> Result<(), MediaError> {
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), MediaError> {
        tokio::task::yield_now().await;
        if self.stall_finish {
            std::future::pending::<()>().await;
        }
        if self.fail_finish {
            return Err(MediaError::Platform("encoder crashed".into()));
        }
        Ok(())
    }

    fn abort(&mut self) {
        if self.open {
            self.open = false;
            self.tracker.open_encoders.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Capture platform whose outcomes are scripted by the test
pub struct FakeCapture {
    pub tracker: Arc<CaptureTracker>,
    deny: Option<MediaError>,
    analyser_error: Option<MediaError>,
    fail_finish: bool,
    stall_finish: bool,
    supported: Vec<String>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(CaptureTracker::default()),
            deny: None,
            analyser_error: None,
            fail_finish: false,
            stall_finish: false,
            supported: vec!["audio/webm;codecs=opus".into()],
            gate: None,
        }
    }

    pub fn denying(mut self, err: MediaError) -> Self {
        self.deny = Some(err);
        self
    }

    pub fn failing_analyser(mut self, err: MediaError) -> Self {
        self.analyser_error = Some(err);
        self
    }

    pub fn failing_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Encoder finalize never resolves on its own
    pub fn stalled_finish(mut self) -> Self {
        self.stall_finish = true;
        self
    }

    pub fn supporting(mut self, types: &[&str]) -> Self {
        self.supported = types.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Hold `open_microphone` until a permit is added to `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl CodecSupport for FakeCapture {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|t| t == mime_type)
    }
}

#[async_trait]
impl CapturePlatform for FakeCapture {
    type Stream = FakeStream;
    type Analyser = FakeAnalyser;
    type Encoder = FakeEncoder;

    async fn open_microphone(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<FakeStream, MediaError> {
        self.tracker.microphone_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| MediaError::Internal(e.to_string()))?
                .forget();
        }
        if let Some(err) = &self.deny {
            return Err(err.clone());
        }
        self.tracker.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStream {
            tracker: Arc::clone(&self.tracker),
            live: true,
        })
    }

    fn open_analyser(&self, _stream: &FakeStream, _fft_size: usize) -> Result<FakeAnalyser, MediaError> {
        if let Some(err) = &self.analyser_error {
            return Err(err.clone());
        }
        self.tracker.open_analysers.fetch_add(1, Ordering::SeqCst);
        Ok(FakeAnalyser {
            tracker: Arc::clone(&self.tracker),
            open: true,
        })
    }

    fn open_encoder(
        &self,
        _stream: &FakeStream,
        _codec: &Codec,
        sink: ChunkSink,
    ) -> Result<FakeEncoder, MediaError> {
        *self.tracker.sink.lock().unwrap() = Some(sink);
        self.tracker.open_encoders.fetch_add(1, Ordering::SeqCst);
        Ok(FakeEncoder {
            tracker: Arc::clone(&self.tracker),
            open: true,
            fail_finish: self.fail_finish,
            stall_finish: self.stall_finish,
        })
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// One element opened by [`FakePlayback`]
#[derive(Clone)]
pub struct ElementHandle {
    pub url: String,
    pub decoded_len: usize,
    events: PlaybackEvents,
    pub plays: Arc<AtomicUsize>,
    pub pauses: Arc<AtomicUsize>,
    pub detached: Arc<AtomicBool>,
}

impl ElementHandle {
    pub fn emit(&self, event: PlaybackEvent) {
        self.events.emit(event);
    }

    pub fn time_update(&self, position_ms: u64, duration_ms: u64) {
        self.emit(PlaybackEvent::TimeUpdate {
            position: Duration::from_millis(position_ms),
            duration: Some(Duration::from_millis(duration_ms)),
        });
    }
}

#[derive(Default)]
pub struct PlaybackTracker {
    live_urls: Mutex<HashMap<String, usize>>,
    revoked: Mutex<Vec<String>>,
    elements: Mutex<Vec<ElementHandle>>,
    next_url: AtomicU64,
}

impl PlaybackTracker {
    pub fn live_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.live_urls.lock().unwrap().keys().cloned().collect();
        urls.sort();
        urls
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn elements(&self) -> Vec<ElementHandle> {
        self.elements.lock().unwrap().clone()
    }

    pub fn element(&self, index: usize) -> ElementHandle {
        self.elements.lock().unwrap()[index].clone()
    }

    /// Elements not yet detached
    pub fn attached(&self) -> usize {
        self.elements
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.detached.load(Ordering::SeqCst))
            .count()
    }
}

pub struct FakeElement {
    plays: Arc<AtomicUsize>,
    pauses: Arc<AtomicUsize>,
    detached: Arc<AtomicBool>,
    refuse_play: bool,
}

impl PlaybackElement for FakeElement {
    fn play(&mut self) -> Result<(), MediaError> {
        if self.refuse_play {
            return Err(MediaError::NotAllowed("autoplay blocked".into()));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&mut self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

/// Playback platform that records every resource and lets the test drive
/// element events
pub struct FakePlayback {
    pub tracker: Arc<PlaybackTracker>,
    refuse_play: bool,
}

impl FakePlayback {
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(PlaybackTracker::default()),
            refuse_play: false,
        }
    }

    pub fn refusing_play(mut self) -> Self {
        self.refuse_play = true;
        self
    }
}

impl PlaybackPlatform for FakePlayback {
    type Element = FakeElement;

    fn create_object_url(&self, payload: &AudioPayload) -> Result<String, MediaError> {
        let n = self.tracker.next_url.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:test/{}", n);
        self.tracker
            .live_urls
            .lock()
            .unwrap()
            .insert(url.clone(), payload.len());
        Ok(url)
    }

    fn revoke_object_url(&self, url: &str) {
        if self.tracker.live_urls.lock().unwrap().remove(url).is_some() {
            self.tracker.revoked.lock().unwrap().push(url.to_string());
        }
    }

    fn open_element(&self, url: &str, events: PlaybackEvents) -> Result<FakeElement, MediaError> {
        let decoded_len = self
            .tracker
            .live_urls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .ok_or_else(|| MediaError::Internal(format!("unknown url {}", url)))?;

        let handle = ElementHandle {
            url: url.to_string(),
            decoded_len,
            events,
            plays: Arc::new(AtomicUsize::new(0)),
            pauses: Arc::new(AtomicUsize::new(0)),
            detached: Arc::new(AtomicBool::new(false)),
        };
        let element = FakeElement {
            plays: Arc::clone(&handle.plays),
            pauses: Arc::clone(&handle.pauses),
            detached: Arc::clone(&handle.detached),
            refuse_play: self.refuse_play,
        };
        self.tracker.elements.lock().unwrap().push(handle);
        Ok(element)
    }
}
