//! Audio controller: microphone capture to a WAV file and WAV playback
//!
//! One controller owns the capture device slot, the recording file and a small
//! worker pool. Capture is a single session at a time, driven by
//! `start_recording`/`stop_recording`; playback requests are independent tasks
//! that never touch capture state.
//!
//! # Locking
//!
//! `start_recording`, `stop_recording` and `last_recording` are serialised by
//! one guard. Start only *tries* the guard and fails with [`AudioError::Busy`]
//! on contention; stop and read block on it. Playback does not take it.

mod capture_task;
mod config;
mod playback_task;
mod slot;

use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::application::ports::{CaptureDevice, CaptureLine, DeviceError, PlaybackDevice};
use crate::domain::audio::{AudioFormatSpec, Recording};
use crate::domain::capture::{CaptureSession, CaptureState, InvalidStateTransition, SessionId};

use capture_task::{drain_to_wav, CaptureTask};
use playback_task::run_playback;

pub use config::ControllerConfig;
pub use playback_task::PlaybackHandle;
pub use slot::DeviceSlot;

/// How long a stop waits for the cancelled capture task's last write
const CAPTURE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Errors raised by the audio controller.
///
/// Each call site reports a single coarse kind; the device-level cause is kept
/// only in the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("Failed to start recording: {0}")]
    StartFailed(String),

    #[error("Recording start or stop already in progress")]
    Busy,

    #[error("Failed to read recording: {0}")]
    ReadFailed(String),

    #[error("Audio playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Recording failed: {0}")]
    CaptureFailed(String),

    #[error("Audio worker pool unavailable: {0}")]
    WorkerPool(String),

    #[error("Audio controller has been shut down")]
    ShutDown,
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn warn_on_drift(result: Result<(), InvalidStateTransition>) {
    if let Err(e) = result {
        log::warn!("Capture state out of step: {}", e);
    }
}

/// State serialised by the start/stop/read guard
#[derive(Default)]
struct Guarded {
    session: CaptureSession,
    task: Option<CaptureTask>,
}

/// State shared between the controller and its background tasks
struct Shared {
    guard: StdMutex<Guarded>,
    slot: DeviceSlot<dyn CaptureLine>,
    format: AudioFormatSpec,
    config: ControllerConfig,
    fault: StdMutex<Option<AudioError>>,
    closed: AtomicBool,
}

impl Shared {
    fn lock_guard(&self) -> MutexGuard<'_, Guarded> {
        lock(&self.guard)
    }

    fn wav_path(&self) -> &Path {
        self.config.wav_path()
    }

    /// Tear down whatever session exists. Caller holds the guard.
    fn stop_locked(&self, guarded: &mut Guarded) {
        let stopping = guarded.session.begin_stop().is_ok();

        let task = guarded.task.take();
        if let Some(task) = &task {
            log::debug!("Cancelling capture task for session {}", task.session);
            task.cancel();
        }

        if let Some(line) = self.slot.release() {
            line.stop();
            line.close();
            log::debug!("Capture device released");
        }

        // The next session truncates the same file
        if let Some(task) = task {
            let session = task.session;
            if !task.wait_finished(CAPTURE_DRAIN_GRACE) {
                log::warn!("Capture task for session {} is still writing after stop", session);
            }
        }

        if stopping {
            warn_on_drift(guarded.session.finish_stop());
            log::info!("Recording stopped");
        }
    }

    /// Self-cleanup from a capture task; ignored once a newer session owns the device
    fn stop_session(&self, session: SessionId) {
        let mut guarded = self.lock_guard();
        if guarded.session.is_active(session) {
            self.stop_locked(&mut guarded);
        } else {
            log::debug!("Capture task for session {} exited after its session ended", session);
        }
    }

    fn record_fault(&self, err: AudioError) {
        *lock(&self.fault) = Some(err);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Releases the owning session on every exit path of a capture task
struct SessionCleanup {
    shared: Arc<Shared>,
    session: SessionId,
}

impl Drop for SessionCleanup {
    fn drop(&mut self) {
        self.shared.stop_session(self.session);
    }
}

/// The audio capture/playback controller.
///
/// Construct once, drive from the host, and call [`AudioController::shutdown`]
/// at end of life (dropping the controller does the same). Shutdown and drop
/// block the calling thread for at most the configured grace period.
pub struct AudioController<C, P>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    shared: Arc<Shared>,
    capture: C,
    playback: Arc<P>,
    pool: StdMutex<Option<Runtime>>,
    interrupt: Arc<AtomicBool>,
}

impl<C, P> AudioController<C, P>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    /// Create a controller and its worker pool
    pub fn new(config: ControllerConfig, capture: C, playback: P) -> Result<Self, AudioError> {
        let pool = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads())
            .thread_name("voice-io-worker")
            .enable_time()
            .build()
            .map_err(|e| AudioError::WorkerPool(e.to_string()))?;

        log::debug!(
            "Audio controller ready: {} -> {}",
            config.format(),
            config.wav_path().display()
        );

        Ok(Self {
            shared: Arc::new(Shared {
                guard: StdMutex::new(Guarded::default()),
                slot: DeviceSlot::new(),
                format: config.format(),
                config,
                fault: StdMutex::new(None),
                closed: AtomicBool::new(false),
            }),
            capture,
            playback: Arc::new(playback),
            pool: StdMutex::new(Some(pool)),
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start capturing into the recording file.
    ///
    /// A no-op while already recording. Fails fast with [`AudioError::Busy`]
    /// if another start or stop holds the guard.
    pub fn start_recording(&self) -> Result<(), AudioError> {
        let mut guarded = match self.shared.guard.try_lock() {
            Ok(guarded) => guarded,
            Err(TryLockError::WouldBlock) => return Err(AudioError::Busy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if self.shared.is_closed() {
            return Err(AudioError::ShutDown);
        }
        if guarded.session.is_recording() {
            log::debug!("start_recording ignored: already recording");
            return Ok(());
        }

        self.shared.stop_locked(&mut guarded);
        guarded
            .session
            .begin_start()
            .map_err(|e| AudioError::StartFailed(e.to_string()))?;

        let line = match self.open_started_line() {
            Ok(line) => line,
            Err(e) => {
                warn_on_drift(guarded.session.abort_start());
                return Err(AudioError::StartFailed(e.to_string()));
            }
        };

        if let Err(line) = self.shared.slot.try_claim(Arc::clone(&line)) {
            log::warn!("Capture device slot already claimed; closing the new handle");
            line.stop();
            line.close();
            warn_on_drift(guarded.session.abort_start());
            return Ok(());
        }

        let session = guarded
            .session
            .mark_recording()
            .map_err(|e| AudioError::StartFailed(e.to_string()))?;
        let cancel = Arc::new(AtomicBool::new(false));
        let (finished_tx, finished_rx) = mpsc::channel();

        let handle = match self.spawn_capture(session, line, Arc::clone(&cancel), finished_tx) {
            Some(handle) => handle,
            None => {
                self.shared.stop_locked(&mut guarded);
                return Err(AudioError::ShutDown);
            }
        };
        guarded.task = Some(CaptureTask::new(session, handle, cancel, finished_rx));

        log::info!(
            "Recording session {} started ({}) -> {}",
            session,
            self.shared.format,
            self.shared.wav_path().display()
        );
        Ok(())
    }

    /// Stop the current capture session, if any.
    ///
    /// Always completes: blocks on the guard rather than failing. The capture
    /// task gets a short bounded wait to finish its last write; the file keeps
    /// whatever had been flushed by then.
    pub fn stop_recording(&self) {
        let mut guarded = self.shared.lock_guard();
        self.shared.stop_locked(&mut guarded);
    }

    /// Read the recording file as it currently is on disk.
    ///
    /// Returns an empty recording if nothing has been recorded yet.
    pub fn last_recording(&self) -> Result<Recording, AudioError> {
        let _guarded = self.shared.lock_guard();
        let path = self.shared.wav_path();
        match std::fs::read(path) {
            Ok(data) => Ok(Recording::new(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Recording::empty()),
            Err(e) => Err(AudioError::ReadFailed(format!("{}: {}", path.display(), e))),
        }
    }

    /// Play a WAV buffer on its own line in the background.
    ///
    /// Never fails synchronously; decode, device and interrupt failures are
    /// reported through the returned handle.
    pub fn play(&self, wav: impl Into<Vec<u8>>) -> PlaybackHandle {
        if self.shared.is_closed() {
            return PlaybackHandle::resolved(Err(AudioError::ShutDown));
        }

        let (tx, rx) = oneshot::channel();
        let bytes = wav.into();
        let device = Arc::clone(&self.playback);
        let interrupt = Arc::clone(&self.interrupt);
        let poll_interval = self.shared.config.poll_interval();

        let spawned = self.spawn(move || {
            let outcome = run_playback(device.as_ref(), bytes, poll_interval, &interrupt);
            match &outcome {
                Ok(()) => log::debug!("Playback finished"),
                Err(e) => log::error!("{}", e),
            }
            let _ = tx.send(outcome);
        });
        if spawned.is_none() {
            return PlaybackHandle::resolved(Err(AudioError::ShutDown));
        }

        PlaybackHandle::new(rx)
    }

    /// Stop recording and shut the worker pool down.
    ///
    /// In-flight tasks get the configured grace period; playback still running
    /// after it is interrupted. Later starts and plays are rejected with
    /// [`AudioError::ShutDown`]. Calling this more than once is harmless.
    ///
    /// Blocks the calling thread for up to the grace period. The worker pool is
    /// torn down on a thread of its own, so this is safe to call from async code.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_recording();

        let pool = lock(&self.pool).take();
        if let Some(pool) = pool {
            let grace = self.shared.config.shutdown_timeout();
            log::debug!("Shutting down audio worker pool ({}ms grace)", grace.as_millis());
            let started = Instant::now();
            shutdown_pool(pool, grace);
            if started.elapsed() >= grace {
                log::warn!(
                    "Audio worker pool did not drain within {}ms; interrupting remaining work",
                    grace.as_millis()
                );
            }
        }

        self.interrupt.store(true, Ordering::SeqCst);
        log::info!("Audio controller shut down");
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        self.shared.lock_guard().session.state()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// Whether a capture device is currently claimed
    pub fn has_open_device(&self) -> bool {
        self.shared.slot.is_occupied()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn format(&self) -> AudioFormatSpec {
        self.shared.format
    }

    pub fn wav_path(&self) -> &Path {
        self.shared.wav_path()
    }

    /// Take the last background capture failure, if one happened
    pub fn take_capture_fault(&self) -> Option<AudioError> {
        lock(&self.shared.fault).take()
    }

    fn open_started_line(&self) -> Result<Arc<dyn CaptureLine>, DeviceError> {
        let line = self.capture.open(&self.shared.format)?;
        if let Err(e) = line.start() {
            line.close();
            return Err(e);
        }
        Ok(line)
    }

    fn spawn_capture(
        &self,
        session: SessionId,
        line: Arc<dyn CaptureLine>,
        cancel: Arc<AtomicBool>,
        finished: Sender<()>,
    ) -> Option<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        self.spawn(move || {
            let _cleanup = SessionCleanup {
                shared: Arc::clone(&shared),
                session,
            };
            match drain_to_wav(line.as_ref(), &shared.format, shared.wav_path(), &cancel) {
                Ok(samples) => {
                    log::debug!("Capture task for session {} wrote {} samples", session, samples)
                }
                Err(e) => {
                    log::error!("Recording session {} failed: {}", session, e);
                    shared.record_fault(e);
                }
            }
            // Must disconnect before the cleanup takes the guard
            drop(finished);
        })
    }

    fn spawn<F>(&self, job: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.pool)
            .as_ref()
            .map(|pool| pool.spawn_blocking(job))
    }
}

/// Shut a runtime down off the calling thread.
///
/// Dropping a runtime from inside another runtime's context panics.
fn shutdown_pool(pool: Runtime, grace: Duration) {
    let spawned = thread::Builder::new()
        .name("voice-io-shutdown".to_string())
        .spawn(move || pool.shutdown_timeout(grace));
    match spawned {
        Ok(handle) => {
            if handle.join().is_err() {
                log::error!("Audio worker pool shutdown panicked");
            }
        }
        Err(e) => log::error!("Failed to spawn worker pool shutdown thread: {}", e),
    }
}

impl<C, P> Drop for AudioController<C, P>
where
    C: CaptureDevice,
    P: PlaybackDevice + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
