//! Hardware-free devices
//!
//! `SyntheticCaptureDevice` produces a sine tone paced at the real sample
//! rate, and `SilentPlaybackDevice` "plays" a clip by waiting out its
//! duration. Both are useful on machines without audio hardware.

use std::f64::consts::TAU;
use std::sync::{Arc, Condvar, Mutex as StdMutex};
use std::time::{Duration, Instant};

use crate::application::ports::{
    CaptureDevice, CaptureLine, DeviceError, PlaybackDevice, PlaybackLine,
};
use crate::domain::audio::{AudioFormatSpec, WavClip};

/// Audio generated per read
const CHUNK_DURATION: Duration = Duration::from_millis(20);

const DEFAULT_FREQUENCY_HZ: f64 = 440.0;
const DEFAULT_AMPLITUDE: f64 = 0.25;

/// Capture device producing a continuous sine tone
#[derive(Debug, Clone, Copy)]
pub struct SyntheticCaptureDevice {
    frequency_hz: f64,
    amplitude: f64,
}

impl SyntheticCaptureDevice {
    pub fn new() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }

    /// Tone frequency and amplitude (clamped to 0.0..=1.0)
    pub fn with_tone(frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            frequency_hz,
            amplitude: amplitude.clamp(0.0, 1.0),
        }
    }
}

impl Default for SyntheticCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for SyntheticCaptureDevice {
    fn open(&self, format: &AudioFormatSpec) -> Result<Arc<dyn CaptureLine>, DeviceError> {
        Ok(Arc::new(SyntheticCaptureLine::new(
            *format,
            self.frequency_hz,
            self.amplitude,
        )))
    }
}

struct ToneState {
    open: bool,
    running: bool,
    frames: u64,
    next_due: Instant,
}

/// Tone line; reads block until the next chunk is due
pub struct SyntheticCaptureLine {
    format: AudioFormatSpec,
    frequency_hz: f64,
    amplitude: f64,
    state: StdMutex<ToneState>,
    wakeup: Condvar,
}

impl SyntheticCaptureLine {
    pub fn new(format: AudioFormatSpec, frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            format,
            frequency_hz,
            amplitude,
            state: StdMutex::new(ToneState {
                open: true,
                running: false,
                frames: 0,
                next_due: Instant::now(),
            }),
            wakeup: Condvar::new(),
        }
    }

    fn chunk_frames(&self, max_frames: usize) -> usize {
        let per_chunk =
            (self.format.sample_rate() as u128 * CHUNK_DURATION.as_millis() / 1000) as usize;
        per_chunk.clamp(1, max_frames)
    }
}

impl CaptureLine for SyntheticCaptureLine {
    fn start(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.open {
            return Err(DeviceError::Unavailable("Capture line is closed".to_string()));
        }
        state.running = true;
        state.next_due = Instant::now();
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let frame_size = self.format.frame_size();
        let max_frames = buf.len() / frame_size;
        if max_frames == 0 {
            return Err(DeviceError::Io(format!(
                "Read buffer of {} bytes is smaller than one frame",
                buf.len()
            )));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if !state.open || !state.running {
                return Ok(0);
            }
            let now = Instant::now();
            if now >= state.next_due {
                break;
            }
            let wait = state.next_due - now;
            state = match self.wakeup.wait_timeout(state, wait) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }

        let frames = self.chunk_frames(max_frames);
        let rate = self.format.sample_rate() as f64;
        let mut bytes = Vec::with_capacity(frames * frame_size);
        for _ in 0..frames {
            let t = state.frames as f64 / rate;
            let value = (self.amplitude * (TAU * self.frequency_hz * t).sin()) as f32;
            for _ in 0..self.format.channels() {
                self.format.encode_sample(value, &mut bytes);
            }
            state.frames += 1;
        }
        state.next_due += Duration::from_secs_f64(frames as f64 / rate);

        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.running = false;
        self.wakeup.notify_all();
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.open = false;
        state.running = false;
        self.wakeup.notify_all();
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).open
    }
}

/// Playback device that only waits out the clip duration
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlaybackDevice;

impl SilentPlaybackDevice {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackDevice for SilentPlaybackDevice {
    fn open(&self, clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError> {
        Ok(Box::new(SilentPlaybackLine {
            duration: clip.duration(),
            started_at: None,
            stopped: false,
        }))
    }
}

struct SilentPlaybackLine {
    duration: Duration,
    started_at: Option<Instant>,
    stopped: bool,
}

impl PlaybackLine for SilentPlaybackLine {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.stopped
            && self
                .started_at
                .map_or(false, |started| started.elapsed() < self.duration)
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
