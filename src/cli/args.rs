//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// voice-io - record from the microphone and play WAV audio
#[derive(Parser, Debug)]
#[command(name = "voice-io")]
#[command(version)]
#[command(about = "Record microphone audio to a WAV buffer and play WAV audio back")]
#[command(long_about = None)]
pub struct Cli {
    /// Use a generated tone and silent playback instead of audio hardware
    #[arg(long, global = true)]
    pub synthetic: bool,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Recording buffer file (overrides config and VOICE_IO_WAV_FILE)
    #[arg(long, global = true, value_name = "FILE")]
    pub wav_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record until Enter or Ctrl+C (or for a fixed duration)
    Record {
        /// Recording duration (e.g., 500ms, 10s, 1m, 2m30s)
        #[arg(short = 'd', long, value_name = "TIME")]
        duration: Option<String>,

        /// Copy the finished recording to this file
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Play a WAV file and wait for it to finish
    Play {
        /// WAV file to play
        file: PathBuf,
    },
    /// Record for a fixed duration, then play the recording back
    Echo {
        /// Recording duration (e.g., 3s)
        #[arg(short = 'd', long, value_name = "TIME", default_value = "3s")]
        duration: String,
    },
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

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "wav_file",
    "sample_rate",
    "bits_per_sample",
    "channels",
    "signed",
    "big_endian",
    "poll_interval_ms",
    "shutdown_timeout_ms",
    "worker_threads",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
