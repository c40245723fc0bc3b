//! Microphone recorder use case
//!
//! Owns at most one [`CaptureSession`] at a time. Device acquisition and
//! encoder finalization run without holding the state lock; a generation
//! counter detects when a `cancel_recording` or a newer `start_recording`
//! overtook the in-flight operation so its result can be discarded.
//! Finalization runs as its own task so discarding the session can abort it.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;

use crate::domain::config::CaptureSettings;
use crate::domain::error::VoiceError;
use crate::domain::recording::{negotiate_codec, Codec, EncodedClip, RecorderEvent, RecorderState};

use super::metering::MeterLoop;
use super::ports::{
    CapturePlatform, ChunkSink, LevelAnalyser, MediaEncoder, MediaError, MicrophoneStream,
};

/// Resources of one recording. Dropping the session releases them in order:
/// metering loop, chunk sink, encoder (or its in-flight finalize), stream
/// tracks, analyser.
///
/// A partially acquired session is the same type with the later fields
/// still empty, so every failure path releases through the same `Drop`.
struct CaptureSession<P: CapturePlatform> {
    meter: Option<MeterLoop>,
    encoder: Option<P::Encoder>,
    finalizing: Option<AbortHandle>,
    stream: P::Stream,
    analyser: Option<Arc<StdMutex<P::Analyser>>>,
    chunks: ChunkSink,
    codec: Codec,
    started_at: Instant,
}

impl<P: CapturePlatform> CaptureSession<P> {
    fn new(stream: P::Stream, codec: Codec) -> Self {
        Self {
            meter: None,
            encoder: None,
            finalizing: None,
            stream,
            analyser: None,
            chunks: ChunkSink::new(),
            codec,
            started_at: Instant::now(),
        }
    }
}

impl<P: CapturePlatform> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        if let Some(mut meter) = self.meter.take() {
            meter.cancel();
        }
        self.chunks.close();
        if let Some(mut encoder) = self.encoder.take() {
            encoder.abort();
        }
        if let Some(finalizing) = self.finalizing.take() {
            finalizing.abort();
        }
        self.stream.stop_tracks();
        if let Some(analyser) = self.analyser.take() {
            let mut analyser = analyser.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = analyser.close() {
                warn!("Failed to close audio analyser: {}", e);
            }
        }
        debug!("Capture session released");
    }
}

struct RecorderCore<P: CapturePlatform> {
    state: RecorderState,
    session: Option<CaptureSession<P>>,
    generation: u64,
    error: Option<VoiceError>,
}

impl<P: CapturePlatform> RecorderCore<P> {
    fn apply(&mut self, event: RecorderEvent) {
        match self.state.on(event) {
            Ok(next) => self.state = next,
            Err(e) => warn!("{}", e),
        }
    }

    /// Drop the session and return to idle, invalidating any in-flight
    /// start or stop
    fn discard(&mut self) -> bool {
        self.generation += 1;
        let released = self.session.take().is_some();
        self.apply(RecorderEvent::Cancelled);
        released
    }
}

/// Microphone recorder: capture, level metering and encoding
pub struct Recorder<P: CapturePlatform> {
    platform: P,
    settings: CaptureSettings,
    core: Mutex<RecorderCore<P>>,
    level: Arc<watch::Sender<f32>>,
}

impl<P: CapturePlatform> Recorder<P> {
    pub fn new(platform: P, settings: CaptureSettings) -> Self {
        let (level, _) = watch::channel(0.0);
        Self {
            platform,
            settings,
            core: Mutex::new(RecorderCore {
                state: RecorderState::Idle,
                session: None,
                generation: 0,
                error: None,
            }),
            level: Arc::new(level),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub async fn state(&self) -> RecorderState {
        self.core.lock().await.state
    }

    /// Last published error, cleared by the next `start_recording`
    pub async fn error(&self) -> Option<VoiceError> {
        self.core.lock().await.error.clone()
    }

    pub async fn is_recording(&self) -> bool {
        self.state().await == RecorderState::Recording
    }

    /// Time since the current session acquired the microphone
    pub async fn elapsed(&self) -> Duration {
        self.core
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.started_at.elapsed())
            .unwrap_or_default()
    }

    /// Current input level in `[0, 1]`; 0 while no session is open
    pub fn level(&self) -> f32 {
        *self.level.borrow()
    }

    pub fn subscribe_level(&self) -> watch::Receiver<f32> {
        self.level.subscribe()
    }

    fn reset_level(&self) {
        self.level.send_replace(0.0);
    }

    /// Acquire the microphone, start metering and start encoding.
    ///
    /// An open session is torn down first. Fails with
    /// [`VoiceError::Cancelled`] if `cancel_recording` or another
    /// `start_recording` ran before acquisition completed.
    pub async fn start_recording(&self) -> Result<(), VoiceError> {
        let generation = {
            let mut core = self.core.lock().await;
            if core.discard() {
                info!("Replacing the open capture session");
                self.reset_level();
            }
            core.error = None;
            core.generation
        };

        let acquired = self.acquire().await;

        let mut core = self.core.lock().await;
        if core.generation != generation {
            debug!("Capture start was superseded; releasing acquired resources");
            drop(acquired);
            return Err(VoiceError::Cancelled);
        }

        match acquired {
            Ok(mut session) => {
                if let Some(analyser) = &session.analyser {
                    session.meter = Some(MeterLoop::spawn(
                        Arc::clone(analyser),
                        Arc::clone(&self.level),
                        self.settings.frame_interval,
                        self.settings.level_reference,
                    ));
                }
                info!("Recording started ({})", session.codec);
                core.session = Some(session);
                core.apply(RecorderEvent::Acquired);
                Ok(())
            }
            Err(err) => {
                warn!("Failed to start recording: {}", err);
                core.apply(RecorderEvent::Failed);
                core.error = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn acquire(&self) -> Result<CaptureSession<P>, VoiceError> {
        let codec = negotiate_codec(&self.settings.codecs, &self.platform);
        debug!("Negotiated codec {}", codec);

        let stream = self
            .platform
            .open_microphone(&self.settings.constraints)
            .await
            .map_err(classify_start_error)?;
        let mut session = CaptureSession::<P>::new(stream, codec);

        let analyser = self
            .platform
            .open_analyser(&session.stream, self.settings.fft_size)
            .map_err(classify_start_error)?;
        session.analyser = Some(Arc::new(StdMutex::new(analyser)));

        let encoder = self
            .platform
            .open_encoder(&session.stream, &session.codec, session.chunks.clone())
            .map_err(classify_start_error)?;
        session
            .encoder
            .insert(encoder)
            .start(self.settings.timeslice)
            .map_err(classify_start_error)?;

        Ok(session)
    }

    /// Finalize the encoder and return the clip.
    ///
    /// Without an active encoder this resolves to `Ok(None)` after the same
    /// cleanup. Also `Ok(None)` if the session was cancelled while
    /// finalizing. A stop issued while another stop is finalizing resolves
    /// to `Ok(None)` and leaves that finalize alone.
    pub async fn stop_recording(&self) -> Result<Option<EncodedClip>, VoiceError> {
        let (finalize, chunks, codec, generation) = {
            let mut core = self.core.lock().await;
            if core.state == RecorderState::Processing {
                debug!("Stop requested while already finalizing");
                return Ok(None);
            }

            let stopping = core.session.as_mut().and_then(|session| {
                let encoder = session.encoder.take()?;
                let finalize = tokio::spawn(finish_encoder(AbortOnDrop(encoder)));
                session.finalizing = Some(finalize.abort_handle());
                Some((finalize, session.chunks.clone(), session.codec.clone()))
            });

            let Some((finalize, chunks, codec)) = stopping else {
                debug!("Stop requested with no active encoder");
                core.discard();
                self.reset_level();
                return Ok(None);
            };

            core.apply(RecorderEvent::StopRequested);
            (finalize, chunks, codec, core.generation)
        };

        let finished = finalize.await;

        let mut core = self.core.lock().await;
        if core.generation != generation {
            debug!("Recording was cancelled while finalizing; discarding clip");
            return Ok(None);
        }

        let outcome = match finished {
            Ok(Ok(())) => Ok(EncodedClip::from_chunks(chunks.take(), codec.mime_type())),
            Ok(Err(e)) => Err(VoiceError::EncodingFailed(e.to_string())),
            Err(e) => Err(VoiceError::EncodingFailed(format!(
                "encoder task ended abnormally: {}",
                e
            ))),
        };

        core.session = None;
        self.reset_level();

        match outcome {
            Ok(clip) => {
                core.apply(RecorderEvent::Finalized);
                info!(
                    "Recording finished: {} ({})",
                    clip.human_readable_size(),
                    clip.content_type()
                );
                Ok(Some(clip))
            }
            Err(err) => {
                warn!("{}", err);
                core.apply(RecorderEvent::Failed);
                core.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Release everything and return to idle. Safe in any state.
    pub async fn cancel_recording(&self) {
        let mut core = self.core.lock().await;
        if core.discard() {
            info!("Recording cancelled");
        }
        self.reset_level();
    }
}

/// Aborts the encoder when the finalize completes or is itself aborted
struct AbortOnDrop<E: MediaEncoder>(E);

impl<E: MediaEncoder> Drop for AbortOnDrop<E> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn finish_encoder<E: MediaEncoder>(mut encoder: AbortOnDrop<E>) -> Result<(), MediaError> {
    encoder.0.finish().await
}

fn classify_start_error(err: MediaError) -> VoiceError {
    match err {
        MediaError::NotAllowed(_) => VoiceError::PermissionDenied,
        MediaError::NotFound(_) => VoiceError::DeviceNotFound,
        MediaError::Platform(reason) => VoiceError::StartFailed(reason),
        MediaError::Internal(reason) => VoiceError::Unexpected(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CaptureConstraints;
    use crate::domain::recording::CodecSupport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        streams: AtomicUsize,
        encoders: AtomicUsize,
    }

    struct MockStream(Arc<Counters>, bool);

    impl MicrophoneStream for MockStream {
        fn stop_tracks(&mut self) {
            if self.1 {
                self.1 = false;
                self.0.streams.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn is_live(&self) -> bool {
            self.1
        }
    }

    struct MockAnalyser;

    impl LevelAnalyser for MockAnalyser {
        fn frequency_bin_count(&self) -> usize {
            4
        }

        fn byte_frequency_data(&mut self, bins: &mut [u8]) {
            bins.fill(0);
        }

        fn close(&mut self) -> Result<(), MediaError> {
            Err(MediaError::Internal("already closed".into()))
        }
    }

    struct MockEncoder {
        counters: Arc<Counters>,
        sink: ChunkSink,
        open: bool,
    }

    #[async_trait]
    impl MediaEncoder for MockEncoder {
        fn start(&mut self, _timeslice: Duration) -> Result<(), MediaError> {
            self.sink.push(vec![1, 2, 3]);
            Ok(())
        }

        async fn finish(&mut self) -> Result<(), MediaError> {
            self.sink.push(vec![4]);
            Ok(())
        }

        fn abort(&mut self) {
            if self.open {
                self.open = false;
                self.counters.encoders.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    struct MockPlatform {
        counters: Arc<Counters>,
        deny: Option<MediaError>,
    }

    impl CodecSupport for MockPlatform {
        fn is_type_supported(&self, mime_type: &str) -> bool {
            mime_type == "audio/ogg;codecs=opus"
        }
    }

    #[async_trait]
    impl CapturePlatform for MockPlatform {
        type Stream = MockStream;
        type Analyser = MockAnalyser;
        type Encoder = MockEncoder;

        async fn open_microphone(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<MockStream, MediaError> {
            if let Some(err) = &self.deny {
                return Err(err.clone());
            }
            self.counters.streams.fetch_add(1, Ordering::SeqCst);
            Ok(MockStream(Arc::clone(&self.counters), true))
        }

        fn open_analyser(&self, _stream: &MockStream, _fft: usize) -> Result<MockAnalyser, MediaError> {
            Ok(MockAnalyser)
        }

        fn open_encoder(
            &self,
            _stream: &MockStream,
            _codec: &Codec,
            sink: ChunkSink,
        ) -> Result<MockEncoder, MediaError> {
            self.counters.encoders.fetch_add(1, Ordering::SeqCst);
            Ok(MockEncoder {
                counters: Arc::clone(&self.counters),
                sink,
                open: true,
            })
        }
    }

    fn recorder(deny: Option<MediaError>) -> (Recorder<MockPlatform>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let platform = MockPlatform {
            counters: Arc::clone(&counters),
            deny,
        };
        (Recorder::new(platform, CaptureSettings::default()), counters)
    }

    #[test]
    fn classifies_platform_errors() {
        assert_eq!(
            classify_start_error(MediaError::NotAllowed("x".into())),
            VoiceError::PermissionDenied
        );
        assert_eq!(
            classify_start_error(MediaError::NotFound("x".into())),
            VoiceError::DeviceNotFound
        );
        assert_eq!(
            classify_start_error(MediaError::Platform("busy".into())),
            VoiceError::StartFailed("busy".into())
        );
        assert_eq!(
            classify_start_error(MediaError::Internal("boom".into())),
            VoiceError::Unexpected("boom".into())
        );
    }

    #[tokio::test]
    async fn start_then_stop_yields_clip() {
        let (recorder, counters) = recorder(None);

        recorder.start_recording().await.unwrap();
        assert_eq!(recorder.state().await, RecorderState::Recording);
        assert_eq!(counters.streams.load(Ordering::SeqCst), 1);

        let clip = recorder.stop_recording().await.unwrap().unwrap();
        assert_eq!(clip.data(), &[1, 2, 3, 4]);
        assert_eq!(clip.content_type(), "audio/ogg;codecs=opus");
        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert_eq!(counters.streams.load(Ordering::SeqCst), 0);
        assert_eq!(counters.encoders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_start_publishes_error() {
        let (recorder, counters) = recorder(Some(MediaError::NotAllowed("denied".into())));

        let err = recorder.start_recording().await.unwrap_err();
        assert_eq!(err, VoiceError::PermissionDenied);
        assert_eq!(recorder.error().await, Some(VoiceError::PermissionDenied));
        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert_eq!(counters.streams.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_while_idle_is_empty() {
        let (recorder, _) = recorder(None);
        assert_eq!(recorder.stop_recording().await.unwrap(), None);
        assert_eq!(recorder.state().await, RecorderState::Idle);
    }

    #[tokio::test]
    async fn cancel_releases_everything() {
        let (recorder, counters) = recorder(None);
        recorder.start_recording().await.unwrap();

        recorder.cancel_recording().await;

        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert_eq!(counters.streams.load(Ordering::SeqCst), 0);
        assert_eq!(counters.encoders.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.level(), 0.0);
        assert_eq!(recorder.elapsed().await, Duration::ZERO);
    }
}
