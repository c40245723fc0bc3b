//! Application configuration value object

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::{
    is_valid_fft_size, CaptureConstraints, CaptureSettings, PlaybackSettings, MAX_VOLUME,
};

/// `[capture]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    pub device: Option<String>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub fft_size: Option<usize>,
    pub level_reference: Option<f32>,
    pub timeslice_ms: Option<u64>,
    pub frame_interval_ms: Option<u64>,
    pub codecs: Option<Vec<String>>,
}

/// `[playback]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    pub volume: Option<f32>,
    pub time_update_ms: Option<u64>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub capture: Option<CaptureConfig>,
    pub playback: Option<PlaybackConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        let capture = CaptureSettings::default();
        let playback = PlaybackSettings::default();
        Self {
            log_level: Some("warn".to_string()),
            capture: Some(CaptureConfig {
                device: None,
                echo_cancellation: Some(capture.constraints.echo_cancellation),
                noise_suppression: Some(capture.constraints.noise_suppression),
                auto_gain_control: Some(capture.constraints.auto_gain_control),
                fft_size: Some(capture.fft_size),
                level_reference: Some(capture.level_reference),
                timeslice_ms: Some(capture.timeslice.as_millis() as u64),
                frame_interval_ms: Some(capture.frame_interval.as_millis() as u64),
                codecs: Some(capture.codecs),
            }),
            playback: Some(PlaybackConfig {
                volume: Some(playback.volume),
                time_update_ms: Some(playback.time_update_interval.as_millis() as u64),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            log_level: other.log_level.or(self.log_level),
            capture: merge_section(self.capture, other.capture, |b, o| CaptureConfig {
                device: o.device.or(b.device),
                echo_cancellation: o.echo_cancellation.or(b.echo_cancellation),
                noise_suppression: o.noise_suppression.or(b.noise_suppression),
                auto_gain_control: o.auto_gain_control.or(b.auto_gain_control),
                fft_size: o.fft_size.or(b.fft_size),
                level_reference: o.level_reference.or(b.level_reference),
                timeslice_ms: o.timeslice_ms.or(b.timeslice_ms),
                frame_interval_ms: o.frame_interval_ms.or(b.frame_interval_ms),
                codecs: o.codecs.or(b.codecs),
            }),
            playback: merge_section(self.playback, other.playback, |b, o| PlaybackConfig {
                volume: o.volume.or(b.volume),
                time_update_ms: o.time_update_ms.or(b.time_update_ms),
            }),
        }
    }

    /// Resolve capture settings, falling back to defaults for missing or
    /// out-of-range values
    pub fn capture_settings(&self) -> CaptureSettings {
        let defaults = CaptureSettings::default();
        let Some(c) = self.capture.as_ref() else {
            return defaults;
        };

        CaptureSettings {
            constraints: CaptureConstraints {
                echo_cancellation: c
                    .echo_cancellation
                    .unwrap_or(defaults.constraints.echo_cancellation),
                noise_suppression: c
                    .noise_suppression
                    .unwrap_or(defaults.constraints.noise_suppression),
                auto_gain_control: c
                    .auto_gain_control
                    .unwrap_or(defaults.constraints.auto_gain_control),
            },
            device: c.device.clone().filter(|d| !d.is_empty()),
            fft_size: c
                .fft_size
                .filter(|&size| is_valid_fft_size(size))
                .unwrap_or(defaults.fft_size),
            level_reference: c
                .level_reference
                .filter(|&r| r > 0.0)
                .unwrap_or(defaults.level_reference),
            timeslice: c
                .timeslice_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeslice),
            frame_interval: c
                .frame_interval_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.frame_interval),
            codecs: c
                .codecs
                .clone()
                .filter(|list| !list.is_empty())
                .unwrap_or(defaults.codecs),
        }
    }

    /// Resolve playback settings
    pub fn playback_settings(&self) -> PlaybackSettings {
        let defaults = PlaybackSettings::default();
        let Some(p) = self.playback.as_ref() else {
            return defaults;
        };

        PlaybackSettings {
            volume: p
                .volume
                .filter(|v| (0.0..=MAX_VOLUME).contains(v))
                .unwrap_or(defaults.volume),
            time_update_interval: p
                .time_update_ms
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.time_update_interval),
        }
    }

    /// Get log level, or "warn" if not set
    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }
}

fn merge_section<T>(base: Option<T>, other: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, other) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(o)) => Some(o),
        (Some(b), Some(o)) => Some(merge(b, o)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_default_settings() {
        let config = AppConfig::defaults();
        assert_eq!(config.capture_settings(), CaptureSettings::default());
        assert_eq!(config.playback_settings(), PlaybackSettings::default());
        assert_eq!(config.log_level_or_default(), "warn");
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.log_level.is_none());
        assert!(config.capture.is_none());
        assert!(config.playback.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            capture: Some(CaptureConfig {
                fft_size: Some(512),
                timeslice_ms: Some(250),
                ..Default::default()
            }),
            ..Default::default()
        };
        let other = AppConfig {
            capture: Some(CaptureConfig {
                fft_size: Some(1024),
                ..Default::default()
            }),
            ..Default::default()
        };

        let settings = base.merge(other).capture_settings();
        assert_eq!(settings.fft_size, 1024);
        assert_eq!(settings.timeslice, Duration::from_millis(250));
    }

    #[test]
    fn merge_keeps_base_sections_when_other_is_empty() {
        let merged = AppConfig::defaults().merge(AppConfig::empty());
        assert_eq!(merged, AppConfig::defaults());
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = AppConfig {
            capture: Some(CaptureConfig {
                fft_size: Some(300),
                level_reference: Some(-1.0),
                timeslice_ms: Some(0),
                codecs: Some(vec![]),
                device: Some(String::new()),
                ..Default::default()
            }),
            playback: Some(PlaybackConfig {
                volume: Some(5.0),
                time_update_ms: Some(0),
            }),
            ..Default::default()
        };

        let capture = config.capture_settings();
        assert_eq!(capture.fft_size, 256);
        assert_eq!(capture.level_reference, 128.0);
        assert_eq!(capture.timeslice, Duration::from_millis(100));
        assert!(!capture.codecs.is_empty());
        assert!(capture.device.is_none());

        let playback = config.playback_settings();
        assert_eq!(playback.volume, 1.0);
        assert_eq!(playback.time_update_interval, Duration::from_millis(250));
    }

    #[test]
    fn constraints_can_be_disabled() {
        let config = AppConfig {
            capture: Some(CaptureConfig {
                echo_cancellation: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let constraints = config.capture_settings().constraints;
        assert!(!constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
    }
}
