//! XDG config store adapter

use std::fs;
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// XDG-compliant config store
pub struct XdgConfigStore {
    path: PathBuf,
}

impl XdgConfigStore {
    /// Create a new XDG config store with default path
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("voice-io");

        Self {
            path: config_dir.join("config.toml"),
        }
    }

    /// Create with custom path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse TOML content into AppConfig
    fn parse_toml(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize AppConfig to TOML
    fn to_toml(config: &AppConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

impl Default for XdgConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for XdgConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.exists() {
            return Ok(AppConfig::empty());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::parse_toml(&content)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let content = Self::to_toml(config)?;
        fs::write(&self.path, content).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn init(&self) -> Result<(), ConfigError> {
        if self.exists() {
            return Err(ConfigError::AlreadyExists(
                self.path.to_string_lossy().to_string(),
            ));
        }

        self.save(&AppConfig::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_xdg() {
        let store = XdgConfigStore::new();
        let path = store.path();
        assert!(path.to_string_lossy().contains("voice-io"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn custom_path() {
        let store = XdgConfigStore::with_path("/custom/path/config.toml");
        assert_eq!(store.path(), PathBuf::from("/custom/path/config.toml"));
    }

    #[test]
    fn parse_toml_flat_format() {
        let content = r#"
wav_file = "/tmp/buffer.wav"
sample_rate = 16000
big_endian = false
poll_interval_ms = 50
"#;

        let config = XdgConfigStore::parse_toml(content).unwrap();
        assert_eq!(config.wav_file, Some("/tmp/buffer.wav".to_string()));
        assert_eq!(config.sample_rate, Some(16_000));
        assert_eq!(config.big_endian, Some(false));
        assert_eq!(config.poll_interval_ms, Some(50));
        assert!(config.channels.is_none());
    }

    #[test]
    fn parse_toml_rejects_wrong_types() {
        let err = XdgConfigStore::parse_toml("sample_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        assert_eq!(store.load().unwrap(), AppConfig::empty());
    }

    #[test]
    fn init_then_load_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("nested").join("config.toml"));

        store.init().unwrap();
        assert_eq!(store.load().unwrap(), AppConfig::defaults());

        let err = store.init().unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
    }
}
