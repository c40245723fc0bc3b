//! Sample feed shared by the cpal callback, the analyser and the encoder

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::config::settings::MAX_FFT_SIZE;

/// Mono samples delivered by the input callback.
///
/// `recent` is a rolling window for the analyser; `pending` holds PCM the
/// encoder has not drained yet and only fills while encoding is enabled.
#[derive(Debug, Default)]
pub struct CaptureFeed {
    recent: VecDeque<f32>,
    pending: Vec<i16>,
    encoding: bool,
}

pub type SharedFeed = Arc<Mutex<CaptureFeed>>;

pub fn shared_feed() -> SharedFeed {
    Arc::new(Mutex::new(CaptureFeed::default()))
}

pub fn lock_feed(feed: &Mutex<CaptureFeed>) -> MutexGuard<'_, CaptureFeed> {
    feed.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaptureFeed {
    /// Downmix interleaved frames to mono and record them
    pub fn push_interleaved<T: Copy>(&mut self, data: &[T], channels: u16, to_f32: impl Fn(T) -> f32) {
        let channels = usize::from(channels.max(1));
        for frame in data.chunks(channels) {
            let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
            self.record(sum / frame.len() as f32);
        }
    }

    fn record(&mut self, sample: f32) {
        if self.recent.len() == MAX_FFT_SIZE {
            self.recent.pop_front();
        }
        self.recent.push_back(sample);
        if self.encoding {
            self.pending.push(to_pcm16(sample));
        }
    }

    /// Copy the latest `out.len()` samples into `out`, zero-filling the
    /// front when fewer are available
    pub fn copy_recent(&self, out: &mut [f32]) {
        let available = self.recent.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        let skip = self.recent.len() - available;
        for (slot, sample) in out[pad..].iter_mut().zip(self.recent.iter().skip(skip)) {
            *slot = *sample;
        }
    }

    pub fn set_encoding(&mut self, encoding: bool) {
        self.encoding = encoding;
        if !encoding {
            self.pending.clear();
        }
    }

    pub fn is_encoding(&self) -> bool {
        self.encoding
    }

    pub fn take_pending(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.pending)
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}
