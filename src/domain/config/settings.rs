//! Resolved runtime settings for capture and playback

use std::time::Duration;

use crate::domain::recording::{DEFAULT_CODEC_PREFERENCES, DEFAULT_LEVEL_REFERENCE};

/// Default analyser transform window (samples)
pub const DEFAULT_FFT_SIZE: usize = 256;

/// Default encoder chunk slice
pub const DEFAULT_TIMESLICE_MS: u64 = 100;

/// Default metering cadence (~60 frames per second)
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Default playback position update cadence
pub const DEFAULT_TIME_UPDATE_MS: u64 = 250;

/// Smallest and largest transform windows an analyser accepts
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32768;

/// Upper bound on playback volume
pub const MAX_VOLUME: f32 = 2.0;

/// Processing requested from the microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Everything the recorder needs to open a capture session
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub constraints: CaptureConstraints,
    /// Preferred input device name; `None` uses the host default
    pub device: Option<String>,
    pub fft_size: usize,
    pub level_reference: f32,
    pub timeslice: Duration,
    pub frame_interval: Duration,
    /// Codec MIME types in descending preference
    pub codecs: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            device: None,
            fft_size: DEFAULT_FFT_SIZE,
            level_reference: DEFAULT_LEVEL_REFERENCE,
            timeslice: Duration::from_millis(DEFAULT_TIMESLICE_MS),
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            codecs: DEFAULT_CODEC_PREFERENCES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Output-side settings
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub volume: f32,
    pub time_update_interval: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            time_update_interval: Duration::from_millis(DEFAULT_TIME_UPDATE_MS),
        }
    }
}

/// Whether `size` is a transform window an analyser accepts
pub fn is_valid_fft_size(size: usize) -> bool {
    size.is_power_of_two() && (MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults() {
        let settings = CaptureSettings::default();
        assert!(settings.constraints.echo_cancellation);
        assert!(settings.constraints.noise_suppression);
        assert!(settings.constraints.auto_gain_control);
        assert_eq!(settings.fft_size, 256);
        assert_eq!(settings.level_reference, 128.0);
        assert_eq!(settings.timeslice, Duration::from_millis(100));
        assert_eq!(settings.codecs[0], "audio/webm;codecs=opus");
    }

    #[test]
    fn fft_size_validation() {
        assert!(is_valid_fft_size(256));
        assert!(is_valid_fft_size(32));
        assert!(is_valid_fft_size(32768));
        assert!(!is_valid_fft_size(16));
        assert!(!is_valid_fft_size(300));
        assert!(!is_valid_fft_size(65536));
    }
}
