//! Capture port interfaces
//!
//! A capture platform hands out three exclusive resources per session: the
//! microphone stream, an analyser tapping that stream, and an encoder
//! writing into a [`ChunkSink`]. Every release method must be idempotent.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::config::CaptureConstraints;
use crate::domain::recording::{Codec, CodecSupport};

use super::media::MediaError;

/// An open microphone stream
pub trait MicrophoneStream: Send + 'static {
    /// Stop every track of the stream. Calling twice is a no-op.
    fn stop_tracks(&mut self);

    /// Whether any track is still delivering audio
    fn is_live(&self) -> bool;
}

/// Frequency-domain analyser over a microphone stream
pub trait LevelAnalyser: Send + 'static {
    /// Number of bins reported per frame (half the transform window)
    fn frequency_bin_count(&self) -> usize;

    /// Fill `bins` with the current 0..=255 magnitude per frequency bin
    fn byte_frequency_data(&mut self, bins: &mut [u8]);

    /// Close the analysis context. Closing a closed analyser is `Ok`.
    fn close(&mut self) -> Result<(), MediaError>;
}

/// Encoder producing timesliced chunks into a [`ChunkSink`]
#[async_trait]
pub trait MediaEncoder: Send + 'static {
    /// Begin encoding, emitting a chunk roughly every `timeslice`
    fn start(&mut self, timeslice: Duration) -> Result<(), MediaError>;

    /// Finalize. Resolves once every pending chunk has been pushed.
    async fn finish(&mut self) -> Result<(), MediaError>;

    /// Stop without flushing. Calling twice is a no-op.
    fn abort(&mut self);
}

/// Platform collaborator that opens capture resources
#[async_trait]
pub trait CapturePlatform: CodecSupport + Send + Sync + 'static {
    type Stream: MicrophoneStream;
    type Analyser: LevelAnalyser;
    type Encoder: MediaEncoder;

    /// Request exclusive microphone access
    async fn open_microphone(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Self::Stream, MediaError>;

    /// Attach an analyser with a `fft_size`-sample transform window
    fn open_analyser(
        &self,
        stream: &Self::Stream,
        fft_size: usize,
    ) -> Result<Self::Analyser, MediaError>;

    /// Attach an encoder for `codec` writing into `sink`
    fn open_encoder(
        &self,
        stream: &Self::Stream,
        codec: &Codec,
        sink: ChunkSink,
    ) -> Result<Self::Encoder, MediaError>;
}

#[derive(Debug, Default)]
struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    closed: bool,
}

/// Ordered buffer of encoder output shared by the encoder and the recorder.
///
/// Once closed, further pushes are dropped.
#[derive(Debug, Clone, Default)]
pub struct ChunkSink {
    inner: Arc<Mutex<ChunkBuffer>>,
}

impl ChunkSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, ChunkBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk. Empty chunks are ignored.
    ///
    /// Returns `false` if the sink is closed.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        let mut buffer = self.buffer();
        if buffer.closed {
            return false;
        }
        if !chunk.is_empty() {
            buffer.chunks.push(chunk);
        }
        true
    }

    /// Overwrite bytes at an absolute offset of the concatenated stream,
    /// e.g. to patch a container header on finalize. Chunk sizes never change.
    ///
    /// Returns `false` if the sink is closed or the range is out of bounds.
    pub fn overwrite(&self, offset: usize, bytes: &[u8]) -> bool {
        let mut buffer = self.buffer();
        if buffer.closed {
            return false;
        }
        let total: usize = buffer.chunks.iter().map(Vec::len).sum();
        if offset + bytes.len() > total {
            return false;
        }

        let mut start = 0;
        let mut remaining = bytes;
        let mut cursor = offset;
        for chunk in buffer.chunks.iter_mut() {
            let end = start + chunk.len();
            if remaining.is_empty() {
                break;
            }
            if cursor < end {
                let local = cursor - start;
                let n = remaining.len().min(chunk.len() - local);
                chunk[local..local + n].copy_from_slice(&remaining[..n]);
                remaining = &remaining[n..];
                cursor += n;
            }
            start = end;
        }
        true
    }

    /// Number of chunks received
    pub fn len(&self) -> usize {
        self.buffer().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes received
    pub fn byte_len(&self) -> usize {
        self.buffer().chunks.iter().map(Vec::len).sum()
    }

    /// Take every buffered chunk in emission order
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.buffer().chunks)
    }

    /// Reject further pushes and drop anything buffered
    pub fn close(&self) {
        let mut buffer = self.buffer();
        buffer.closed = true;
        buffer.chunks.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.buffer().closed
    }
}
