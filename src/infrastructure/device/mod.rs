//! Audio device adapters
//!
//! cpal for microphone capture, rodio for playback, and synthetic devices
//! for running without audio hardware.

mod cpal_capture;
mod rodio_playback;
mod synthetic;

pub use cpal_capture::{CpalCaptureDevice, CpalCaptureLine};
pub use rodio_playback::RodioPlaybackDevice;
pub use synthetic::{SilentPlaybackDevice, SyntheticCaptureDevice, SyntheticCaptureLine};
