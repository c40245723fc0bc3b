//! Configuration store port

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Persistent home of the user's [`AppConfig`]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored config. A missing file yields an empty config.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Replace the stored config
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write [`AppConfig::defaults`]; fails with
    /// [`ConfigError::AlreadyExists`] if a file is already present
    async fn init(&self) -> Result<(), ConfigError>;
}
