//! Capture session state machine

use std::fmt;
use thiserror::Error;

/// Capture lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of one device-to-file recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: String,
}

/// Capture session entity.
/// Tracks the lifecycle of the single recording a controller may run.
///
/// State machine:
///   IDLE -> STARTING (begin_start)
///   STARTING -> RECORDING (mark_recording)
///   STARTING -> IDLE (abort_start)
///   STARTING | RECORDING -> STOPPING (begin_stop)
///   STOPPING -> IDLE (finish_stop)
#[derive(Debug, Default)]
pub struct CaptureSession {
    state: CaptureState,
    current: Option<SessionId>,
    last_id: u64,
}

impl CaptureSession {
    /// Create a new session tracker in idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// The active session, if recording or stopping
    pub fn current(&self) -> Option<SessionId> {
        self.current
    }

    /// Whether `id` is the session currently recording
    pub fn is_active(&self, id: SessionId) -> bool {
        self.state == CaptureState::Recording && self.current == Some(id)
    }

    /// Transition from IDLE to STARTING
    pub fn begin_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.expect(CaptureState::Idle, "start recording")?;
        self.state = CaptureState::Starting;
        Ok(())
    }

    /// Transition from STARTING back to IDLE (device open failed or claim lost)
    pub fn abort_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.expect(CaptureState::Starting, "abort start")?;
        self.state = CaptureState::Idle;
        Ok(())
    }

    /// Transition from STARTING to RECORDING, allocating a fresh session id
    pub fn mark_recording(&mut self) -> Result<SessionId, InvalidStateTransition> {
        self.expect(CaptureState::Starting, "mark recording")?;
        self.last_id += 1;
        let id = SessionId(self.last_id);
        self.current = Some(id);
        self.state = CaptureState::Recording;
        Ok(id)
    }

    /// Transition from STARTING or RECORDING to STOPPING
    pub fn begin_stop(&mut self) -> Result<(), InvalidStateTransition> {
        match self.state {
            CaptureState::Starting | CaptureState::Recording => {
                self.state = CaptureState::Stopping;
                Ok(())
            }
            current_state => Err(InvalidStateTransition {
                current_state,
                action: "stop recording".to_string(),
            }),
        }
    }

    /// Transition from STOPPING to IDLE
    pub fn finish_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.expect(CaptureState::Stopping, "finish stop")?;
        self.current = None;
        self.state = CaptureState::Idle;
        Ok(())
    }

    fn expect(&self, wanted: CaptureState, action: &str) -> Result<(), InvalidStateTransition> {
        if self.state != wanted {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle() {
        let session = CaptureSession::new();
        assert!(session.is_idle());
        assert!(!session.is_recording());
        assert!(session.current().is_none());
    }

    #[test]
    fn start_then_record() {
        let mut session = CaptureSession::new();
        session.begin_start().unwrap();
        assert_eq!(session.state(), CaptureState::Starting);

        let id = session.mark_recording().unwrap();
        assert!(session.is_recording());
        assert!(session.is_active(id));
    }

    #[test]
    fn begin_start_while_recording_fails() {
        let mut session = CaptureSession::new();
        session.begin_start().unwrap();
        session.mark_recording().unwrap();

        let err = session.begin_start().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Recording);
        assert!(err.action.contains("start recording"));
    }

    #[test]
    fn abort_start_returns_to_idle() {
        let mut session = CaptureSession::new();
        session.begin_start().unwrap();
        session.abort_start().unwrap();
        assert!(session.is_idle());
        assert!(session.current().is_none());
    }

    #[test]
    fn stop_from_idle_fails() {
        let mut session = CaptureSession::new();
        let err = session.begin_stop().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Idle);
    }

    #[test]
    fn full_cycle_allocates_new_ids() {
        let mut session = CaptureSession::new();

        session.begin_start().unwrap();
        let first = session.mark_recording().unwrap();
        session.begin_stop().unwrap();
        assert_eq!(session.state(), CaptureState::Stopping);
        assert!(!session.is_active(first));
        session.finish_stop().unwrap();
        assert!(session.is_idle());

        session.begin_start().unwrap();
        let second = session.mark_recording().unwrap();
        assert!(second > first);
        assert!(session.is_active(second));
        assert!(!session.is_active(first));
    }

    #[test]
    fn finish_stop_requires_stopping() {
        let mut session = CaptureSession::new();
        session.begin_start().unwrap();
        session.mark_recording().unwrap();
        let err = session.finish_stop().unwrap_err();
        assert_eq!(err.current_state, CaptureState::Recording);
    }

    #[test]
    fn state_display() {
        assert_eq!(CaptureState::Idle.to_string(), "idle");
        assert_eq!(CaptureState::Starting.to_string(), "starting");
        assert_eq!(CaptureState::Recording.to_string(), "recording");
        assert_eq!(CaptureState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: CaptureState::Stopping,
            action: "start recording".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("start recording"));
        assert!(msg.contains("stopping"));
    }
}
