//! Configuration port interface

use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Port for configuration storage
pub trait ConfigStore: Send + Sync {
    /// Load configuration from storage.
    ///
    /// # Returns
    /// The loaded config (all None fields if the file doesn't exist)
    fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Save configuration to storage.
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    /// Get the configuration file path.
    fn path(&self) -> PathBuf;

    /// Check if configuration file exists.
    fn exists(&self) -> bool;

    /// Initialize configuration file with defaults.
    /// Fails if file already exists.
    fn init(&self) -> Result<(), ConfigError>;
}
