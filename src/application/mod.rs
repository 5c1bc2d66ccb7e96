//! Application layer - The audio controller and port interfaces
//!
//! Contains the capture/playback controller and the trait definitions
//! for audio devices and configuration storage.

pub mod controller;
pub mod ports;

// Re-export the controller surface
pub use controller::{AudioController, AudioError, ControllerConfig, PlaybackHandle};
