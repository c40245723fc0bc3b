//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// ChatVoice - record and play voice clips for chatbot conversations
#[derive(Parser, Debug)]
#[command(name = "chat-voice")]
#[command(version)]
#[command(about = "Record and play voice clips for chatbot conversations")]
#[command(long_about = None)]
pub struct Cli {
    /// Config file to use instead of the XDG location
    #[arg(long, global = true, value_name = "PATH", env = "CHAT_VOICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record from the microphone until Ctrl-C or the time limit
    Record {
        /// Stop after this many seconds
        #[arg(short, long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
        seconds: Option<u64>,

        /// Output file (defaults to recording-<timestamp>.<ext>)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Play an audio file until it ends or Ctrl-C
    Play {
        /// Audio file, raw or base64-encoded
        file: PathBuf,

        /// MIME type of the audio (guessed from the extension if omitted)
        #[arg(short = 't', long, value_name = "TYPE")]
        content_type: Option<String>,

        /// The file holds base64 text rather than raw bytes
        #[arg(long)]
        base64: bool,
    },
    /// List audio input and output devices
    Devices,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed record options
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub seconds: Option<u64>,
    pub output: Option<PathBuf>,
}

/// Parsed play options
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub file: PathBuf,
    pub content_type: Option<String>,
    pub base64: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "log_level",
    "capture.device",
    "capture.echo_cancellation",
    "capture.noise_suppression",
    "capture.auto_gain_control",
    "capture.fft_size",
    "capture.level_reference",
    "capture.timeslice_ms",
    "capture.frame_interval_ms",
    "capture.codecs",
    "playback.volume",
    "playback.time_update_ms",
];

/// Accepted `log_level` values
pub const VALID_LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
