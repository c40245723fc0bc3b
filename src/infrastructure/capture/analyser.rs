//! FFT spectrum analyser over the capture feed
//!
//! Produces byte magnitudes the way a browser analyser node does: Blackman
//! window, per-bin exponential smoothing, then decibels mapped linearly
//! from `[MIN_DECIBELS, MAX_DECIBELS]` onto `0..=255`.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::application::ports::{LevelAnalyser, MediaError};
use crate::domain::config::settings::is_valid_fft_size;

use super::feed::{lock_feed, SharedFeed};

const SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

pub struct SpectrumAnalyser {
    feed: SharedFeed,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    closed: bool,
}

impl SpectrumAnalyser {
    pub fn new(feed: SharedFeed, fft_size: usize) -> Result<Self, MediaError> {
        if !is_valid_fft_size(fft_size) {
            return Err(MediaError::Internal(format!(
                "FFT size {} is not a supported power of two",
                fft_size
            )));
        }

        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        Ok(Self {
            feed,
            fft,
            window: blackman_window(fft_size),
            samples: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            closed: false,
        })
    }
}

impl LevelAnalyser for SpectrumAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.smoothed.len()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        if self.closed {
            bins.fill(0);
            return;
        }

        lock_feed(&self.feed).copy_recent(&mut self.samples);

        for ((slot, sample), weight) in self
            .buffer
            .iter_mut()
            .zip(&self.samples)
            .zip(&self.window)
        {
            *slot = Complex::new(sample * weight, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let norm = 1.0 / self.samples.len() as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * norm;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }

        for (byte, magnitude) in bins.iter_mut().zip(&self.smoothed) {
            *byte = magnitude_to_byte(*magnitude);
        }
    }

    fn close(&mut self) -> Result<(), MediaError> {
        self.closed = true;
        self.smoothed.fill(0.0);
        Ok(())
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::capture::feed::shared_feed;

    #[test]
    fn rejects_invalid_fft_size() {
        assert!(SpectrumAnalyser::new(shared_feed(), 100).is_err());
        assert!(SpectrumAnalyser::new(shared_feed(), 256).is_ok());
    }

    #[test]
    fn bin_count_is_half_the_window() {
        let analyser = SpectrumAnalyser::new(shared_feed(), 256).unwrap();
        assert_eq!(analyser.frequency_bin_count(), 128);
    }

    #[test]
    fn silence_reads_zero() {
        let mut analyser = SpectrumAnalyser::new(shared_feed(), 64).unwrap();
        let mut bins = vec![7u8; 32];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_raises_its_bin() {
        let feed = shared_feed();
        let tone: Vec<f32> = (0..256)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / 256.0).sin())
            .collect();
        lock_feed(&feed).push_interleaved(&tone, 1, |s| s);

        let mut analyser = SpectrumAnalyser::new(feed, 256).unwrap();
        let mut bins = vec![0u8; 128];
        for _ in 0..10 {
            analyser.byte_frequency_data(&mut bins);
        }

        assert_eq!(bins[8], 255);
        assert!(bins[40] < 50);
        assert!(bins[100] < 50);
    }

    #[test]
    fn closed_analyser_reads_zero() {
        let feed = shared_feed();
        lock_feed(&feed).push_interleaved(&[1.0f32; 64], 1, |s| s);
        let mut analyser = SpectrumAnalyser::new(feed, 64).unwrap();
        analyser.close().unwrap();
        analyser.close().unwrap();

        let mut bins = vec![1u8; 32];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn decibel_mapping_bounds() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(1e-6), 0);
        assert_eq!(magnitude_to_byte(1.0), 255);
    }
}
