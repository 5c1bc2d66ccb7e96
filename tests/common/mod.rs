//! Scripted fake devices shared by the integration tests

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavSpec, WavWriter};

use voice_io::application::ports::{
    CaptureDevice, CaptureLine, DeviceError, PlaybackDevice, PlaybackLine,
};
use voice_io::domain::audio::{AudioFormatSpec, WavClip};

/// Open/close bookkeeping for a fake capture device
#[derive(Default)]
pub struct LineCounters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub started: AtomicUsize,
}

impl LineCounters {
    /// Lines opened and not yet closed
    pub fn open_lines(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// How a fake capture device misbehaves
#[derive(Debug, Clone, Default)]
pub enum CaptureScript {
    /// Deliver a short chunk of audio every few milliseconds
    #[default]
    Healthy,
    /// Refuse to open
    OpenFails,
    /// Open, then refuse to start
    StartFails,
    /// Fail the first read
    ReadFails,
}

/// Capture device with counters and a scripted behaviour
pub struct FakeCaptureDevice {
    pub counters: Arc<LineCounters>,
    script: CaptureScript,
    open_delay: Duration,
}

impl FakeCaptureDevice {
    pub fn new() -> Self {
        Self::scripted(CaptureScript::Healthy)
    }

    pub fn scripted(script: CaptureScript) -> Self {
        Self {
            counters: Arc::new(LineCounters::default()),
            script,
            open_delay: Duration::ZERO,
        }
    }

    /// Make every open take `delay`, widening the start window
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }
}

impl CaptureDevice for FakeCaptureDevice {
    fn open(&self, format: &AudioFormatSpec) -> Result<Arc<dyn CaptureLine>, DeviceError> {
        if !self.open_delay.is_zero() {
            thread::sleep(self.open_delay);
        }
        if matches!(self.script, CaptureScript::OpenFails) {
            return Err(DeviceError::Unavailable("no microphone".to_string()));
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeCaptureLine {
            counters: Arc::clone(&self.counters),
            script: self.script.clone(),
            frame_size: format.frame_size(),
            running: AtomicBool::new(false),
            open: AtomicBool::new(true),
        }))
    }
}

struct FakeCaptureLine {
    counters: Arc<LineCounters>,
    script: CaptureScript,
    frame_size: usize,
    running: AtomicBool,
    open: AtomicBool,
}

impl CaptureLine for FakeCaptureLine {
    fn start(&self) -> Result<(), DeviceError> {
        if matches!(self.script, CaptureScript::StartFails) {
            return Err(DeviceError::PermissionDenied("microphone blocked".to_string()));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if matches!(self.script, CaptureScript::ReadFails) {
            return Err(DeviceError::Io("buffer overrun".to_string()));
        }
        thread::sleep(Duration::from_millis(5));
        if !self.running.load(Ordering::SeqCst) || !self.open.load(Ordering::SeqCst) {
            return Ok(0);
        }

        let n = (self.frame_size * 32).min(buf.len() / self.frame_size * self.frame_size);
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            *byte = (i % 7) as u8;
        }
        Ok(n)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Playback device whose lines run until stopped
#[derive(Default)]
pub struct EndlessPlaybackDevice {
    pub stops: Arc<AtomicUsize>,
}

impl PlaybackDevice for EndlessPlaybackDevice {
    fn open(&self, _clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError> {
        Ok(Box::new(EndlessLine {
            running: false,
            stops: Arc::clone(&self.stops),
        }))
    }
}

struct EndlessLine {
    running: bool,
    stops: Arc<AtomicUsize>,
}

impl PlaybackLine for EndlessLine {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.running = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A mono 16-bit WAV buffer
pub fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
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

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
