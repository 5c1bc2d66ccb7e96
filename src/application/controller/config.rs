//! Runtime configuration for the audio controller

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::audio::AudioFormatSpec;
use crate::domain::config::{
    AppConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_WAV_FILE,
    DEFAULT_WORKER_THREADS,
};
use crate::domain::error::FormatError;

/// Validated controller settings: the fixed capture format, the recording file
/// and the worker/polling tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    format: AudioFormatSpec,
    wav_path: PathBuf,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    worker_threads: usize,
}

impl ControllerConfig {
    /// Default settings recording to `wav_path`
    pub fn new(wav_path: impl Into<PathBuf>) -> Self {
        Self {
            format: AudioFormatSpec::default(),
            wav_path: wav_path.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }

    /// Build from merged application config
    pub fn from_app_config(config: &AppConfig) -> Result<Self, FormatError> {
        Ok(Self {
            format: config.format_or_default()?,
            wav_path: config.wav_file_or_default(),
            poll_interval: config.poll_interval_or_default(),
            shutdown_timeout: config.shutdown_timeout_or_default(),
            worker_threads: config.worker_threads_or_default(),
        })
    }

    /// Set the capture format
    pub fn with_format(mut self, format: AudioFormatSpec) -> Self {
        self.format = format;
        self
    }

    /// Set the playback completion poll interval (zero is ignored)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.poll_interval = interval;
        }
        self
    }

    /// Set the grace period given to in-flight tasks at shutdown
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the number of background execution slots (zero is ignored)
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        if threads > 0 {
            self.worker_threads = threads;
        }
        self
    }

    pub fn format(&self) -> AudioFormatSpec {
        self.format
    }

    pub fn wav_path(&self) -> &Path {
        &self.wav_path
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WAV_FILE)
    }
}
