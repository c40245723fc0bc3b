//! Microphone capture platform backed by cpal
//!
//! `cpal::Stream` is not `Send`, so each microphone stream lives on its own
//! thread. The input callback downmixes into a [`CaptureFeed`] which the
//! analyser and the encoder read from. Recordings are encoded as Ogg/Opus
//! or WAV.
//!
//! [`CaptureFeed`]: super::feed::CaptureFeed

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::application::ports::{CapturePlatform, ChunkSink, MediaError, MicrophoneStream};
use crate::domain::config::CaptureConstraints;
use crate::domain::recording::{Codec, CodecSupport};

use super::analyser::SpectrumAnalyser;
use super::feed::{lock_feed, shared_feed, SharedFeed};
use super::ogg_opus::OggOpusContainer;
use super::stream_encoder::{ContainerWriter, StreamEncoder};
use super::wav::WavContainer;

/// Containers this platform can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    OggOpus,
    Wav,
}

impl Container {
    fn for_codec(codec: &Codec) -> Option<Self> {
        let essence = codec.essence().to_ascii_lowercase();
        match (essence.as_str(), codec.codecs()) {
            ("audio/ogg", None) => Some(Self::OggOpus),
            ("audio/ogg", Some(codecs)) if codecs.eq_ignore_ascii_case("opus") => {
                Some(Self::OggOpus)
            }
            ("audio/wav" | "audio/wave" | "audio/x-wav", None) => Some(Self::Wav),
            _ => None,
        }
    }

    fn writer(self, sample_rate: u32) -> Result<Box<dyn ContainerWriter>, MediaError> {
        Ok(match self {
            Self::OggOpus => Box::new(OggOpusContainer::new(sample_rate)?),
            Self::Wav => Box::new(WavContainer::new(sample_rate)?),
        })
    }
}

/// Capture platform using the default cpal host
#[derive(Debug, Clone, Default)]
pub struct CpalCapturePlatform {
    device: Option<String>,
}

impl CpalCapturePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture from the named input device instead of the host default
    pub fn with_device(device: Option<String>) -> Self {
        Self { device }
    }
}

impl CodecSupport for CpalCapturePlatform {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        Container::for_codec(&Codec::new(mime_type)).is_some()
    }
}

/// Microphone stream running on a dedicated capture thread.
///
/// The thread parks on `stop` and closes the device as soon as the sender
/// is dropped.
pub struct CpalStream {
    feed: SharedFeed,
    sample_rate: u32,
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneStream for CpalStream {
    fn stop_tracks(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }

    fn is_live(&self) -> bool {
        self.stop.is_some() && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

#[async_trait]
impl CapturePlatform for CpalCapturePlatform {
    type Stream = CpalStream;
    type Analyser = SpectrumAnalyser;
    type Encoder = StreamEncoder;

    async fn open_microphone(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CpalStream, MediaError> {
        if *constraints != CaptureConstraints::default() {
            debug!("Capture constraints are not configurable on this host: {:?}", constraints);
        }

        let feed = shared_feed();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("chat-voice-capture".into())
            .spawn({
                let device = self.device.clone();
                let feed = Arc::clone(&feed);
                move || run_capture(device, feed, stop_rx, ready_tx)
            })
            .map_err(|e| MediaError::Internal(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(sample_rate)) => {
                debug!("Microphone open at {} Hz", sample_rate);
                Ok(CpalStream {
                    feed,
                    sample_rate,
                    stop: Some(stop_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(MediaError::Internal(
                "Capture thread exited before the stream opened".into(),
            )),
        }
    }

    fn open_analyser(&self, stream: &CpalStream, fft_size: usize) -> Result<SpectrumAnalyser, MediaError> {
        SpectrumAnalyser::new(Arc::clone(&stream.feed), fft_size)
    }

    fn open_encoder(
        &self,
        stream: &CpalStream,
        codec: &Codec,
        sink: ChunkSink,
    ) -> Result<StreamEncoder, MediaError> {
        let container = Container::for_codec(codec).ok_or_else(|| {
            MediaError::Platform(format!("No encoder available for {}", codec))
        })?;
        let writer = container.writer(stream.sample_rate)?;
        debug!("Encoding {:?} from {} Hz capture", container, stream.sample_rate);
        Ok(StreamEncoder::new(Arc::clone(&stream.feed), sink, writer))
    }
}

fn run_capture(
    device: Option<String>,
    feed: SharedFeed,
    stop: mpsc::Receiver<()>,
    ready: oneshot::Sender<Result<u32, MediaError>>,
) {
    let stream = match open_input_stream(device.as_deref(), &feed) {
        Ok((stream, sample_rate)) => {
            if ready.send(Ok(sample_rate)).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Returns once the stream handle drops its sender
    let _ = stop.recv();

    drop(stream);
    debug!("Capture thread stopped");
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, MediaError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or_else(|| MediaError::NotFound("No default input device".into())),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| MediaError::Platform(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| MediaError::NotFound(format!("Input device '{}' not found", wanted))),
    }
}

fn open_input_stream(
    name: Option<&str>,
    feed: &SharedFeed,
) -> Result<(cpal::Stream, u32), MediaError> {
    let device = find_input_device(name)?;
    let supported = device.default_input_config().map_err(|e| match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => MediaError::NotFound(e.to_string()),
        other => classify_backend_message(other.to_string()),
    })?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match sample_format {
        SampleFormat::F32 => {
            let feed = Arc::clone(feed);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    lock_feed(&feed).push_interleaved(data, channels, |s| s);
                },
                |err| warn!("Audio input stream error: {}", err),
                None,
            )
        }
        SampleFormat::I16 => {
            let feed = Arc::clone(feed);
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    lock_feed(&feed).push_interleaved(data, channels, |s| f32::from(s) / 32768.0);
                },
                |err| warn!("Audio input stream error: {}", err),
                None,
            )
        }
        SampleFormat::U16 => {
            let feed = Arc::clone(feed);
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    lock_feed(&feed).push_interleaved(data, channels, |s| {
                        (f32::from(s) - 32768.0) / 32768.0
                    });
                },
                |err| warn!("Audio input stream error: {}", err),
                None,
            )
        }
        other => {
            return Err(MediaError::Platform(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => MediaError::NotFound(e.to_string()),
        other => classify_backend_message(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| classify_backend_message(e.to_string()))?;

    Ok((stream, sample_rate))
}

/// Hosts report permission problems only as backend text
fn classify_backend_message(message: String) -> MediaError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        MediaError::NotAllowed(message)
    } else {
        MediaError::Platform(message)
    }
}
