//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::settings::{is_valid_fft_size, MAX_VOLUME};
use crate::domain::config::{AppConfig, CaptureConfig, PlaybackConfig};
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS, VALID_LOG_LEVELS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let mut config = store.load().await?;
    apply_config_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let config = store.load().await?;
    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        let value = config_value(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

/// Render the stored value of `key`, if set
fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    let capture = config.capture.as_ref();
    let playback = config.playback.as_ref();

    match key {
        "log_level" => config.log_level.clone(),
        "capture.device" => capture.and_then(|c| c.device.clone()),
        "capture.echo_cancellation" => capture
            .and_then(|c| c.echo_cancellation)
            .map(|b| b.to_string()),
        "capture.noise_suppression" => capture
            .and_then(|c| c.noise_suppression)
            .map(|b| b.to_string()),
        "capture.auto_gain_control" => capture
            .and_then(|c| c.auto_gain_control)
            .map(|b| b.to_string()),
        "capture.fft_size" => capture.and_then(|c| c.fft_size).map(|n| n.to_string()),
        "capture.level_reference" => capture
            .and_then(|c| c.level_reference)
            .map(|r| r.to_string()),
        "capture.timeslice_ms" => capture.and_then(|c| c.timeslice_ms).map(|n| n.to_string()),
        "capture.frame_interval_ms" => capture
            .and_then(|c| c.frame_interval_ms)
            .map(|n| n.to_string()),
        "capture.codecs" => capture.and_then(|c| c.codecs.as_ref()).map(|l| l.join(",")),
        "playback.volume" => playback.and_then(|p| p.volume).map(|v| v.to_string()),
        "playback.time_update_ms" => playback
            .and_then(|p| p.time_update_ms)
            .map(|n| n.to_string()),
        _ => None,
    }
}

/// Parse `value` for `key` and store it in `config`
fn apply_config_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };

    if key == "log_level" {
        let lower = value.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&lower.as_str()) {
            return Err(invalid(format!(
                "Invalid value '{}'. Valid options: {}",
                value,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        config.log_level = Some(lower);
        return Ok(());
    }

    if let Some(field) = key.strip_prefix("playback.") {
        let playback = config.playback.get_or_insert_with(PlaybackConfig::default);
        match field {
            "volume" => {
                let volume = value
                    .parse::<f32>()
                    .ok()
                    .filter(|v| (0.0..=MAX_VOLUME).contains(v))
                    .ok_or_else(|| {
                        invalid(format!("Value must be a number between 0 and {}", MAX_VOLUME))
                    })?;
                playback.volume = Some(volume);
            }
            "time_update_ms" => {
                playback.time_update_ms = Some(parse_millis(value).map_err(invalid)?);
            }
            _ => return Err(invalid("Unknown playback setting".to_string())),
        }
        return Ok(());
    }

    let Some(field) = key.strip_prefix("capture.") else {
        return Err(invalid("Unknown key".to_string()));
    };
    let capture = config.capture.get_or_insert_with(CaptureConfig::default);
    match field {
        "device" => {
            let name = value.trim();
            if name.is_empty() {
                return Err(invalid("Device name must not be empty".to_string()));
            }
            capture.device = Some(name.to_string());
        }
        "echo_cancellation" => capture.echo_cancellation = Some(parse_flag(value).map_err(invalid)?),
        "noise_suppression" => capture.noise_suppression = Some(parse_flag(value).map_err(invalid)?),
        "auto_gain_control" => capture.auto_gain_control = Some(parse_flag(value).map_err(invalid)?),
        "fft_size" => {
            let size = value
                .parse::<usize>()
                .ok()
                .filter(|&n| is_valid_fft_size(n))
                .ok_or_else(|| {
                    invalid("Value must be a power of two between 32 and 32768".to_string())
                })?;
            capture.fft_size = Some(size);
        }
        "level_reference" => {
            let reference = value
                .parse::<f32>()
                .ok()
                .filter(|r| r.is_finite() && *r > 0.0)
                .ok_or_else(|| invalid("Value must be a positive number".to_string()))?;
            capture.level_reference = Some(reference);
        }
        "timeslice_ms" => capture.timeslice_ms = Some(parse_millis(value).map_err(invalid)?),
        "frame_interval_ms" => {
            capture.frame_interval_ms = Some(parse_millis(value).map_err(invalid)?)
        }
        "codecs" => capture.codecs = Some(parse_codec_list(value).map_err(invalid)?),
        _ => return Err(invalid("Unknown capture setting".to_string())),
    }
    Ok(())
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    parse_bool(value).map_err(|_| "Value must be 'true' or 'false'".to_string())
}

fn parse_millis(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .ok()
        .filter(|&ms| ms > 0)
        .ok_or_else(|| "Value must be a positive number of milliseconds".to_string())
}

/// Comma-separated MIME types, most preferred first
fn parse_codec_list(value: &str) -> Result<Vec<String>, String> {
    let codecs: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if codecs.is_empty() {
        return Err("At least one MIME type is required".to_string());
    }
    if let Some(bad) = codecs.iter().find(|c| !c.contains('/')) {
        return Err(format!("'{}' is not a MIME type", bad));
    }
    Ok(codecs)
}
