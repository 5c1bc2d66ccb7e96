//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces: audio devices
//! backed by cpal and rodio, hardware-free stand-ins, and the XDG config store.

pub mod config;
pub mod device;

// Re-export adapters
pub use config::XdgConfigStore;
pub use device::{
    CpalCaptureDevice, RodioPlaybackDevice, SilentPlaybackDevice, SyntheticCaptureDevice,
};
