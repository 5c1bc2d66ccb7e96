//! Domain layer - Core audio logic
//!
//! Contains value objects, the capture session state machine, and domain errors.
//! This layer has no dependencies on audio devices or the filesystem.

pub mod audio;
pub mod capture;
pub mod config;
pub mod duration;
pub mod error;

// Re-export common types
pub use audio::{AudioFormatSpec, ByteOrder, Recording, WavClip};
pub use capture::{CaptureSession, CaptureState, SessionId};
pub use config::AppConfig;
pub use duration::Duration;
pub use error::*;
