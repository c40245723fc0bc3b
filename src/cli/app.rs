//! Command runners for record, play and devices

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

use crate::application::ports::ConfigStore;
use crate::application::{Player, Recorder};
use crate::domain::config::{AppConfig, CaptureSettings, PlaybackSettings};
use crate::domain::error::ConfigError;
use crate::domain::playback::{AudioPayload, PlayerState};
use crate::domain::recording::codec::content_type_for_extension;
use crate::domain::recording::EncodedClip;
use crate::infrastructure::{list_devices, CpalCapturePlatform, RodioPlaybackPlatform};

use super::args::{PlayOptions, RecordOptions};
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

const METER_REFRESH: Duration = Duration::from_millis(100);

/// Content type used when none is given and the extension is unknown
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Record from the microphone until Ctrl-C or the time limit, then save the clip
pub async fn run_record(options: RecordOptions, settings: CaptureSettings) -> ExitCode {
    let mut presenter = Presenter::new();
    let shutdown = ShutdownSignal::new();
    shutdown.listen();

    let platform = CpalCapturePlatform::with_device(settings.device.clone());
    let recorder = Recorder::new(platform, settings);

    presenter.start_spinner("Opening microphone...");
    if let Err(e) = recorder.start_recording().await {
        presenter.spinner_fail(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    let limit = options.seconds.map(Duration::from_secs);
    let mut ticker = interval(METER_REFRESH);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.requested() => break,
            _ = ticker.tick() => {
                let elapsed = recorder.elapsed().await;
                let meter = presenter.format_level(recorder.level(), elapsed, limit);
                presenter.update_spinner(&format!("Recording {}", meter));
                if limit.is_some_and(|limit| elapsed >= limit) {
                    break;
                }
            }
        }
    }

    presenter.update_spinner("Finishing...");
    let clip = match recorder.stop_recording().await {
        Ok(Some(clip)) => clip,
        Ok(None) => {
            presenter.spinner_fail("Recording was cancelled");
            return ExitCode::from(EXIT_ERROR);
        }
        Err(e) => {
            presenter.spinner_fail(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let path = options.output.unwrap_or_else(|| default_output_path(&clip));
    if let Err(e) = tokio::fs::write(&path, clip.data()).await {
        presenter.spinner_fail(&format!("Failed to write {}: {}", path.display(), e));
        return ExitCode::from(EXIT_ERROR);
    }

    info!("Saved {} bytes of {}", clip.size_bytes(), clip.content_type());
    presenter.spinner_success(&format!(
        "Saved {} ({}, {})",
        path.display(),
        clip.human_readable_size(),
        clip.content_type()
    ));
    ExitCode::from(EXIT_SUCCESS)
}

/// Play a file until it ends, fails, or Ctrl-C
pub async fn run_play(options: PlayOptions, settings: PlaybackSettings) -> ExitCode {
    let mut presenter = Presenter::new();

    let bytes = match tokio::fs::read(&options.file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            presenter.error(&format!("Failed to read {}: {}", options.file.display(), e));
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let content_type = options
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&options.file));
    debug!("Playing {} as {}", options.file.display(), content_type);

    let shutdown = ShutdownSignal::new();
    shutdown.listen();

    let player = Player::new(RodioPlaybackPlatform::new(settings));
    let ended = Arc::new(Notify::new());
    let ended_signal = Arc::clone(&ended);
    player.on_ended(move || ended_signal.notify_one());

    let started = if options.base64 {
        player.play(&String::from_utf8_lossy(&bytes), &content_type)
    } else {
        player.play_blob(AudioPayload::new(bytes, content_type))
    };
    if let Err(e) = started {
        presenter.error(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    presenter.start_progress("Playing");
    let mut progress = player.subscribe_progress();
    let mut ticker = interval(METER_REFRESH);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ended.notified() => {
                presenter.set_progress(1.0);
                presenter.finish_progress("Playback finished");
                return ExitCode::from(EXIT_SUCCESS);
            }
            _ = shutdown.requested() => {
                player.stop();
                presenter.abandon_progress("Playback stopped");
                return ExitCode::from(EXIT_SUCCESS);
            }
            Ok(()) = progress.changed() => {
                presenter.set_progress(*progress.borrow_and_update());
            }
            _ = ticker.tick() => {
                if player.state() == PlayerState::Idle {
                    if let Some(e) = player.error() {
                        presenter.abandon_progress(&e.to_string());
                        return ExitCode::from(EXIT_ERROR);
                    }
                }
            }
        }
    }
}

/// List capture and playback devices
pub fn run_devices(presenter: &Presenter) -> ExitCode {
    let devices = match list_devices() {
        Ok(devices) => devices,
        Err(e) => {
            presenter.error(&format!("Failed to list audio devices: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if devices.is_empty() {
        presenter.warn("No audio devices found");
        return ExitCode::from(EXIT_SUCCESS);
    }

    for device in devices {
        let name = if device.is_default {
            format!("{} (default)", device.name)
        } else {
            device.name
        };
        presenter.key_value(device.direction.as_str(), &name);
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Load the config file and merge it over the defaults
pub async fn load_merged_config<S: ConfigStore>(store: &S) -> Result<AppConfig, ConfigError> {
    let file_config = store.load().await?;
    Ok(AppConfig::defaults().merge(file_config))
}

/// Initialize env_logger. `RUST_LOG` wins over `-v`, which wins over the config.
pub fn init_logging(verbose: u8, config_level: &str) {
    let default_filter = match verbose {
        0 => config_level,
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .format_timestamp_millis()
    .try_init();
}

fn guess_content_type(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(content_type_for_extension)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

fn default_output_path(clip: &EncodedClip) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    PathBuf::from(format!("recording-{}.{}", stamp, clip.extension()))
}
