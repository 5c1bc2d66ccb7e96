//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected <number>ms, <number>s, <number>m or a combination (e.g., 500ms, 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an audio format profile cannot be used for capture
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Unsupported bit depth: {0} (expected 8, 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    #[error("Channel count must be at least 1")]
    NoChannels,

    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
