//! Configuration domain module

mod app_config;

pub use app_config::{
    AppConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_WAV_FILE,
    DEFAULT_WORKER_THREADS,
};
