//! Capture session domain module

mod session;

pub use session::{CaptureSession, CaptureState, InvalidStateTransition, SessionId};
