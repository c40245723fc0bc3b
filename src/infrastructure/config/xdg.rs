//! XDG config store adapter

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

const APP_DIR: &str = "chat-voice";
const CONFIG_FILE: &str = "config.toml";

/// XDG-compliant config store
#[derive(Debug, Clone)]
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    /// Store at `$XDG_CONFIG_HOME/chat-voice/config.toml`
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join(APP_DIR);

        Self {
            path: config_dir.join(CONFIG_FILE),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `path` when given, the XDG location otherwise
    pub fn from_override(path: Option<PathBuf>) -> Self {
        path.map(Self::with_path).unwrap_or_default()
    }

    /// Parse TOML content into AppConfig. Unknown keys are rejected.
    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize AppConfig to TOML
    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config)
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for XdgConfigStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            return Ok(AppConfig::empty());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(config)?;

        // Replace the file in one step so a failed write keeps the old config
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        let defaults = AppConfig::defaults();
        self.save(&defaults).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{CaptureConfig, PlaybackConfig};

    #[test]
    fn default_path_is_xdg() {
        let store = XdgConfigStore::new();
        let path = store.path();
        assert!(path.to_string_lossy().contains("chat-voice"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn override_path_wins() {
        let store = XdgConfigStore::from_override(Some(PathBuf::from("/custom/voice.toml")));
        assert_eq!(store.path(), PathBuf::from("/custom/voice.toml"));
        assert_eq!(XdgConfigStore::from_override(None).path(), XdgConfigStore::new().path());
    }

    #[test]
    fn parse_sectioned_toml() {
        let content = r#"
log_level = "debug"

[capture]
fft_size = 512
codecs = ["audio/ogg;codecs=opus", "audio/wav"]

[playback]
volume = 0.5
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        let capture = config.capture.unwrap();
        assert_eq!(capture.fft_size, Some(512));
        assert_eq!(capture.codecs.unwrap().len(), 2);
        assert_eq!(config.playback.unwrap().volume, Some(0.5));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = XdgConfigStore::parse_toml("api_key = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn to_toml_round_trip() {
        let config = AppConfig {
            log_level: Some("info".to_string()),
            capture: Some(CaptureConfig {
                device: Some("USB Mic".to_string()),
                timeslice_ms: Some(250),
                ..Default::default()
            }),
            playback: Some(PlaybackConfig {
                volume: Some(1.5),
                ..Default::default()
            }),
        };

        let toml = XdgConfigStore::to_toml(&config).unwrap();
        let parsed = XdgConfigStore::parse_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[tokio::test]
    async fn init_then_init_again_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested/config.toml"));

        assert_eq!(store.load().await.unwrap(), AppConfig::empty());
        store.init().await.unwrap();
        assert!(store.exists());
        assert_eq!(store.load().await.unwrap(), AppConfig::defaults());
        assert!(matches!(
            store.init().await,
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn save_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = XdgConfigStore::with_path(&path);

        store.save(&AppConfig::defaults()).await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
