//! Application configuration value object

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::domain::audio::{
    AudioFormatSpec, ByteOrder, DEFAULT_BITS_PER_SAMPLE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE,
};
use crate::domain::error::FormatError;

/// Default recording buffer file name
pub const DEFAULT_WAV_FILE: &str = "AudioRecordBuffer.wav";

/// Default playback completion poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default grace period for in-flight work at shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Default number of background execution slots
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub wav_file: Option<String>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u16>,
    pub channels: Option<u16>,
    pub signed: Option<bool>,
    pub big_endian: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    pub shutdown_timeout_ms: Option<u64>,
    pub worker_threads: Option<usize>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            wav_file: Some(DEFAULT_WAV_FILE.to_string()),
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            bits_per_sample: Some(DEFAULT_BITS_PER_SAMPLE),
            channels: Some(DEFAULT_CHANNELS),
            signed: Some(true),
            big_endian: Some(true),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            shutdown_timeout_ms: Some(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            worker_threads: Some(DEFAULT_WORKER_THREADS),
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
            wav_file: other.wav_file.or(self.wav_file),
            sample_rate: other.sample_rate.or(self.sample_rate),
            bits_per_sample: other.bits_per_sample.or(self.bits_per_sample),
            channels: other.channels.or(self.channels),
            signed: other.signed.or(self.signed),
            big_endian: other.big_endian.or(self.big_endian),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            shutdown_timeout_ms: other.shutdown_timeout_ms.or(self.shutdown_timeout_ms),
            worker_threads: other.worker_threads.or(self.worker_threads),
        }
    }

    /// Recording buffer path, or the default file name in the working directory
    pub fn wav_file_or_default(&self) -> PathBuf {
        PathBuf::from(self.wav_file.as_deref().unwrap_or(DEFAULT_WAV_FILE))
    }

    /// Build the capture format profile, filling gaps with defaults
    pub fn format_or_default(&self) -> Result<AudioFormatSpec, FormatError> {
        AudioFormatSpec::new(
            self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE),
            self.channels.unwrap_or(DEFAULT_CHANNELS),
            self.signed.unwrap_or(true),
            ByteOrder::from_big_endian(self.big_endian.unwrap_or(true)),
        )
    }

    /// Get the playback poll interval, or the default if not set
    pub fn poll_interval_or_default(&self) -> StdDuration {
        StdDuration::from_millis(
            self.poll_interval_ms
                .filter(|&ms| ms > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        )
    }

    /// Get the shutdown grace period, or the default if not set
    pub fn shutdown_timeout_or_default(&self) -> StdDuration {
        StdDuration::from_millis(self.shutdown_timeout_ms.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS))
    }

    /// Get the worker slot count, or the default if not set or zero
    pub fn worker_threads_or_default(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_WORKER_THREADS)
    }
}
