//! Background playback of caller-supplied WAV buffers

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::application::ports::{PlaybackDevice, PlaybackLine};
use crate::domain::audio::WavClip;

use super::AudioError;

/// Polls a started line may take to report itself running before the clip is
/// assumed to have drained already
const START_GRACE_POLLS: u32 = 10;

/// Outcome of one playback request.
///
/// Playback failures are attached here instead of being raised by `play`.
/// `wait` blocks the calling thread; async hosts can `.await` the handle.
pub struct PlaybackHandle {
    outcome: oneshot::Receiver<Result<(), AudioError>>,
    resolved: Option<Result<(), AudioError>>,
}

impl PlaybackHandle {
    pub(crate) fn new(outcome: oneshot::Receiver<Result<(), AudioError>>) -> Self {
        Self {
            outcome,
            resolved: None,
        }
    }

    /// A handle that is already resolved
    pub(crate) fn resolved(outcome: Result<(), AudioError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome.clone());
        Self {
            outcome: rx,
            resolved: Some(outcome),
        }
    }

    /// Non-blocking check for the task's outcome
    pub fn try_outcome(&mut self) -> Option<Result<(), AudioError>> {
        if self.resolved.is_none() {
            match self.outcome.try_recv() {
                Ok(outcome) => self.resolved = Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => self.resolved = Some(Err(dropped())),
            }
        }
        self.resolved.clone()
    }

    pub fn is_finished(&mut self) -> bool {
        self.try_outcome().is_some()
    }

    /// Block until playback completes or fails.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<(), AudioError> {
        if let Some(outcome) = self.resolved {
            return outcome;
        }
        self.outcome.blocking_recv().unwrap_or_else(|_| Err(dropped()))
    }

    /// Block for at most `timeout`; `None` if still playing
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<(), AudioError>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(outcome) = self.try_outcome() {
                return Some(outcome);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Future for PlaybackHandle {
    type Output = Result<(), AudioError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.resolved.clone() {
            return Poll::Ready(outcome);
        }
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(result) => {
                let outcome = result.unwrap_or_else(|_| Err(dropped()));
                self.resolved = Some(outcome.clone());
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn dropped() -> AudioError {
    AudioError::PlaybackFailed("Playback task ended without a result".to_string())
}

/// Decode `bytes`, play them on a fresh line and wait for the line to finish.
///
/// Completion is detected by polling the line every `poll_interval`. Raising
/// `interrupt` ends the wait with a failure.
pub(crate) fn run_playback<P: PlaybackDevice + ?Sized>(
    device: &P,
    bytes: Vec<u8>,
    poll_interval: Duration,
    interrupt: &AtomicBool,
) -> Result<(), AudioError> {
    let clip = WavClip::decode(&bytes)
        .map_err(|e| AudioError::PlaybackFailed(format!("Invalid WAV data: {}", e)))?;
    drop(bytes);

    if clip.channels() == 0 || clip.sample_rate() == 0 {
        return Err(AudioError::PlaybackFailed(format!(
            "Unsupported audio format: {} channels at {} Hz",
            clip.channels(),
            clip.sample_rate()
        )));
    }
    if clip.is_empty() {
        log::debug!("Skipping playback of empty clip");
        return Ok(());
    }

    let duration = clip.duration();
    let mut line = device
        .open(clip)
        .map_err(|e| AudioError::PlaybackFailed(e.to_string()))?;
    log::debug!("Playback line opened ({:.2}s clip)", duration.as_secs_f64());

    let result = drive_line(line.as_mut(), poll_interval, interrupt);
    line.stop();
    result
}

fn drive_line(
    line: &mut dyn PlaybackLine,
    poll_interval: Duration,
    interrupt: &AtomicBool,
) -> Result<(), AudioError> {
    line.start()
        .map_err(|e| AudioError::PlaybackFailed(e.to_string()))?;

    let mut polls = 0;
    while !line.is_running() {
        if polls >= START_GRACE_POLLS {
            log::debug!("Playback line never reported running; assuming clip drained");
            return Ok(());
        }
        sleep_unless_interrupted(poll_interval, interrupt)?;
        polls += 1;
    }

    while line.is_running() {
        sleep_unless_interrupted(poll_interval, interrupt)?;
    }

    Ok(())
}

fn sleep_unless_interrupted(interval: Duration, interrupt: &AtomicBool) -> Result<(), AudioError> {
    if interrupt.load(Ordering::SeqCst) {
        return Err(AudioError::PlaybackFailed("Playback interrupted".to_string()));
    }
    thread::sleep(interval);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::DeviceError;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::cell::Cell;
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Line that reports running for a fixed number of polls
    struct CountingLine {
        remaining: Cell<u32>,
        started: bool,
        stops: Arc<AtomicUsize>,
    }

    impl PlaybackLine for CountingLine {
        fn start(&mut self) -> Result<(), DeviceError> {
            self.started = true;
            Ok(())
        }

        fn is_running(&self) -> bool {
            if !self.started || self.remaining.get() == 0 {
                return false;
            }
            self.remaining.set(self.remaining.get() - 1);
            true
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingDevice {
        polls: u32,
        stops: Arc<AtomicUsize>,
    }

    impl PlaybackDevice for CountingDevice {
        fn open(&self, _clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError> {
            Ok(Box::new(CountingLine {
                remaining: Cell::new(self.polls),
                started: false,
                stops: Arc::clone(&self.stops),
            }))
        }
    }

    struct UnavailableDevice;

    impl PlaybackDevice for UnavailableDevice {
        fn open(&self, _clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError> {
            Err(DeviceError::Unavailable("no speakers".to_string()))
        }
    }

    fn wav(samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn plays_until_line_stops_running_then_releases_it() {
        let stops = Arc::new(AtomicUsize::new(0));
        let device = CountingDevice {
            polls: 3,
            stops: Arc::clone(&stops),
        };

        run_playback(&device, wav(&[1, 2, 3]), POLL, &AtomicBool::new(false)).unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corrupt_bytes_fail_without_opening_a_line() {
        let stops = Arc::new(AtomicUsize::new(0));
        let device = CountingDevice {
            polls: 3,
            stops: Arc::clone(&stops),
        };

        let err = run_playback(&device, b"not a wav".to_vec(), POLL, &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, AudioError::PlaybackFailed(_)));
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unavailable_line_is_playback_failure() {
        let err = run_playback(&UnavailableDevice, wav(&[1]), POLL, &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, AudioError::PlaybackFailed(ref msg) if msg.contains("no speakers")));
    }

    #[test]
    fn empty_clip_completes_immediately() {
        assert!(run_playback(&UnavailableDevice, wav(&[]), POLL, &AtomicBool::new(false)).is_ok());
    }

    #[test]
    fn interrupt_ends_wait_with_failure() {
        let stops = Arc::new(AtomicUsize::new(0));
        let device = CountingDevice {
            polls: u32::MAX,
            stops: Arc::clone(&stops),
        };

        let err = run_playback(&device, wav(&[1, 2]), POLL, &AtomicBool::new(true)).unwrap_err();
        assert_eq!(err, AudioError::PlaybackFailed("Playback interrupted".to_string()));
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn line_that_never_runs_is_treated_as_drained() {
        let stops = Arc::new(AtomicUsize::new(0));
        let device = CountingDevice {
            polls: 0,
            stops: Arc::clone(&stops),
        };

        run_playback(&device, wav(&[1]), POLL, &AtomicBool::new(false)).unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolved_handle_reports_outcome() {
        let mut handle = PlaybackHandle::resolved(Err(AudioError::ShutDown));
        assert!(handle.is_finished());
        assert_eq!(handle.wait(), Err(AudioError::ShutDown));
    }

    #[test]
    fn handle_with_dropped_sender_fails() {
        let (tx, rx) = oneshot::channel::<Result<(), AudioError>>();
        drop(tx);
        let handle = PlaybackHandle::new(rx);
        assert!(matches!(handle.wait(), Err(AudioError::PlaybackFailed(_))));
    }

    #[test]
    fn wait_timeout_returns_none_while_pending() {
        let (_tx, rx) = oneshot::channel::<Result<(), AudioError>>();
        let mut handle = PlaybackHandle::new(rx);
        assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
    }
}
