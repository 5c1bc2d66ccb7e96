//! Audio device port interfaces
//!
//! A capture line behaves like an OS microphone handle: opened with a fixed
//! format, started, drained with blocking reads, then stopped and closed from
//! whichever thread owns the session. A playback line is opened for one decoded
//! clip, started, polled until it stops running, and released.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::audio::{AudioFormatSpec, WavClip};

/// Device-level failure causes.
///
/// The controller collapses these into one coarse error per call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Audio format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Permission denied for audio device: {0}")]
    PermissionDenied(String),

    #[error("Audio device I/O error: {0}")]
    Io(String),
}

/// An open microphone stream producing raw PCM in the requested format
pub trait CaptureLine: Send + Sync {
    /// Begin delivering audio
    fn start(&self) -> Result<(), DeviceError>;

    /// Block until raw bytes are available and copy them into `buf`.
    ///
    /// Returns `Ok(0)` once the line has been stopped or closed.
    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Stop delivering audio; pending reads return `Ok(0)`
    fn stop(&self);

    /// Release the OS handle. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Factory for capture lines
pub trait CaptureDevice: Send + Sync {
    /// Open a capture line for `format`. The line is opened but not started.
    fn open(&self, format: &AudioFormatSpec) -> Result<Arc<dyn CaptureLine>, DeviceError>;
}

/// An open speaker stream loaded with one clip.
///
/// Owned by a single playback task and never shared, so it need not be `Send`.
pub trait PlaybackLine {
    /// Begin playing the loaded clip
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Whether the line is currently producing audio
    fn is_running(&self) -> bool;

    /// Stop playback and release the line
    fn stop(&mut self);
}

/// Factory for playback lines
pub trait PlaybackDevice: Send + Sync {
    /// Open a playback line sized to the clip's own format
    fn open(&self, clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError>;
}
