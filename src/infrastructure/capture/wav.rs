//! 16-bit mono WAV written through hound
//!
//! hound writes into an in-memory cursor. Each append hands out only the
//! bytes written since the last call; `end` finalizes the file and returns
//! the header with the real sizes so the first chunk can be patched.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::application::ports::MediaError;

use super::stream_encoder::{ContainerTail, ContainerWriter};

const BYTES_PER_SAMPLE: u64 = 2;

/// Cursor shared between the hound writer and the container
#[derive(Debug, Clone, Default)]
struct SharedCursor(Arc<Mutex<Cursor<Vec<u8>>>>);

impl SharedCursor {
    fn lock(&self) -> MutexGuard<'_, Cursor<Vec<u8>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn len(&self) -> usize {
        self.lock().get_ref().len()
    }

    fn bytes(&self, from: usize, to: usize) -> Vec<u8> {
        self.lock().get_ref()[from..to].to_vec()
    }
}

impl Write for SharedCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.lock().seek(pos)
    }
}

pub struct WavContainer {
    writer: Option<WavWriter<SharedCursor>>,
    output: SharedCursor,
    header_len: usize,
    emitted: usize,
    max_data_bytes: u64,
}

impl WavContainer {
    pub fn new(sample_rate: u32) -> Result<Self, MediaError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let output = SharedCursor::default();
        let writer = WavWriter::new(output.clone(), spec).map_err(wav_error)?;
        let header_len = output.len();

        Ok(Self {
            writer: Some(writer),
            output,
            header_len,
            emitted: 0,
            // RIFF sizes are 32-bit and count the header after the first 8 bytes
            max_data_bytes: u64::from(u32::MAX) - header_len as u64,
        })
    }

    #[cfg(test)]
    fn with_data_limit(mut self, max_data_bytes: u64) -> Self {
        self.max_data_bytes = max_data_bytes;
        self
    }

    fn take_written(&mut self) -> Vec<u8> {
        let end = self.output.len();
        let bytes = self.output.bytes(self.emitted, end);
        self.emitted = end;
        bytes
    }
}

fn wav_error(err: hound::Error) -> MediaError {
    MediaError::Platform(format!("WAV encoding failed: {}", err))
}

impl ContainerWriter for WavContainer {
    fn begin(&mut self) -> Result<Vec<u8>, MediaError> {
        Ok(self.take_written())
    }

    fn append(&mut self, pcm: &[i16]) -> Result<Vec<u8>, MediaError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| MediaError::Internal("WAV stream already ended".into()))?;

        let written = u64::from(writer.len()) * BYTES_PER_SAMPLE;
        let incoming = pcm.len() as u64 * BYTES_PER_SAMPLE;
        if written + incoming > self.max_data_bytes {
            return Err(MediaError::Platform(format!(
                "WAV size limit of {} data bytes reached",
                self.max_data_bytes
            )));
        }

        for &sample in pcm {
            writer.write_sample(sample).map_err(wav_error)?;
        }
        Ok(self.take_written())
    }

    fn end(&mut self) -> Result<ContainerTail, MediaError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| MediaError::Internal("WAV stream already ended".into()))?;
        writer.finalize().map_err(wav_error)?;

        Ok(ContainerTail {
            bytes: self.take_written(),
            header: Some(self.output.bytes(0, self.header_len)),
        })
    }
}
