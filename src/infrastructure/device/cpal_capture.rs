//! Microphone capture line using cpal
//!
//! `cpal::Stream` is not `Send`, so each line owns a dedicated thread that
//! builds the stream, applies start/stop commands, and drops it on close.
//! The stream callback converts device samples into the requested raw PCM
//! layout and hands them to readers over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, PlayStreamError, SampleFormat, SampleRate, StreamConfig};

use crate::application::ports::{CaptureDevice, CaptureLine, DeviceError};
use crate::domain::audio::AudioFormatSpec;

/// How long a blocked read waits before re-checking the line state
const READ_POLL: Duration = Duration::from_millis(50);

/// Capture device backed by the default cpal input device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalCaptureDevice;

impl CpalCaptureDevice {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn open(&self, format: &AudioFormatSpec) -> Result<Arc<dyn CaptureLine>, DeviceError> {
        Ok(Arc::new(CpalCaptureLine::open(*format)?))
    }
}

enum StreamCommand {
    Start(Sender<Result<(), DeviceError>>),
    Stop,
    Close,
}

struct ChunkReader {
    chunks: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

/// An open cpal input stream
pub struct CpalCaptureLine {
    commands: StdMutex<Sender<StreamCommand>>,
    reader: StdMutex<ChunkReader>,
    running: AtomicBool,
    open: AtomicBool,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl CpalCaptureLine {
    /// Open the default input device for `format`, paused
    pub fn open(format: AudioFormatSpec) -> Result<Self, DeviceError> {
        let (command_tx, command_rx) = mpsc::channel();
        let (data_tx, data_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("voice-io-capture".to_string())
            .spawn(move || run_stream(format, command_rx, data_tx, ready_tx))
            .map_err(|e| DeviceError::Io(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                return Err(DeviceError::Unavailable(
                    "Capture thread exited before opening the stream".to_string(),
                ))
            }
        }

        Ok(Self {
            commands: StdMutex::new(command_tx),
            reader: StdMutex::new(ChunkReader {
                chunks: data_rx,
                pending: Vec::new(),
                offset: 0,
            }),
            running: AtomicBool::new(false),
            open: AtomicBool::new(true),
            worker: StdMutex::new(Some(worker)),
        })
    }

    fn send(&self, command: StreamCommand) -> bool {
        self.commands
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .send(command)
            .is_ok()
    }
}

impl CaptureLine for CpalCaptureLine {
    fn start(&self) -> Result<(), DeviceError> {
        if !self.is_open() {
            return Err(DeviceError::Unavailable("Capture line is closed".to_string()));
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        if !self.send(StreamCommand::Start(reply_tx)) {
            return Err(DeviceError::Unavailable("Capture thread has exited".to_string()));
        }
        reply_rx
            .recv()
            .map_err(|_| DeviceError::Unavailable("Capture thread has exited".to_string()))??;

        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if !self.running.load(Ordering::SeqCst) || !self.is_open() {
                return Ok(0);
            }

            if reader.offset < reader.pending.len() {
                let available = &reader.pending[reader.offset..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                reader.offset += n;
                return Ok(n);
            }

            match reader.chunks.recv_timeout(READ_POLL) {
                Ok(chunk) => {
                    reader.pending = chunk;
                    reader.offset = 0;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.send(StreamCommand::Stop);
        }
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.send(StreamCommand::Close);

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for CpalCaptureLine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Stream-owning thread body
fn run_stream(
    format: AudioFormatSpec,
    commands: Receiver<StreamCommand>,
    data: Sender<Vec<u8>>,
    ready: Sender<Result<(), DeviceError>>,
) {
    let stream = match build_stream(&format, data) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Start(reply) => {
                let _ = reply.send(stream.play().map_err(map_play_error));
            }
            StreamCommand::Stop => {
                if let Err(e) = stream.pause() {
                    log::warn!("Failed to pause capture stream: {}", e);
                }
            }
            StreamCommand::Close => break,
        }
    }

    drop(stream);
    log::debug!("Capture stream closed");
}

fn build_stream(
    format: &AudioFormatSpec,
    data: Sender<Vec<u8>>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| DeviceError::Unavailable("No default input device".to_string()))?;
    let (config, sample_format) = select_config(&device, format)?;

    log::debug!(
        "Opening input device '{}': {} Hz, {} channels, {:?}",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    let format = *format;
    let channels = config.channels;
    let err_fn = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |samples: &[i16], _: &cpal::InputCallbackInfo| {
                let normalised: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
                let _ = data.send(encode_frames(&normalised, channels, &format));
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |samples: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = data.send(encode_frames(samples, channels, &format));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(DeviceError::UnsupportedFormat(format!(
                "Unsupported device sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(map_build_error)
}

/// Pick an i16/f32 input configuration that supports the requested rate,
/// preferring the requested channel count
fn select_config(
    device: &cpal::Device,
    format: &AudioFormatSpec,
) -> Result<(StreamConfig, SampleFormat), DeviceError> {
    let rate = format.sample_rate();
    let ranges = device
        .supported_input_configs()
        .map_err(|e| DeviceError::Unavailable(format!("Failed to query input configs: {}", e)))?;

    let mut best: Option<cpal::SupportedStreamConfigRange> = None;
    for range in ranges {
        if !matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32) {
            continue;
        }
        if range.min_sample_rate().0 > rate || range.max_sample_rate().0 < rate {
            continue;
        }

        let is_better = match &best {
            None => true,
            Some(current) => {
                range.channels() == format.channels() && current.channels() != format.channels()
            }
        };
        if is_better {
            best = Some(range);
        }
    }

    let range = best.ok_or_else(|| {
        DeviceError::UnsupportedFormat(format!("No input configuration supports {}", format))
    })?;

    let config = StreamConfig {
        channels: range.channels(),
        sample_rate: SampleRate(rate),
        buffer_size: cpal::BufferSize::Default,
    };
    Ok((config, range.sample_format()))
}

/// Convert interleaved device samples to the raw layout of `format`.
///
/// Matching channel counts are copied through; otherwise each frame is mixed
/// down and written to every target channel.
pub(crate) fn encode_frames(samples: &[f32], device_channels: u16, format: &AudioFormatSpec) -> Vec<u8> {
    let device_channels = device_channels.max(1) as usize;
    let target_channels = format.channels() as usize;
    let frames = samples.len() / device_channels;
    let mut out = Vec::with_capacity(frames * format.frame_size());

    for frame in samples.chunks_exact(device_channels) {
        if device_channels == target_channels {
            for &sample in frame {
                format.encode_sample(sample, &mut out);
            }
        } else {
            let mixed = frame.iter().sum::<f32>() / device_channels as f32;
            for _ in 0..target_channels {
                format.encode_sample(mixed, &mut out);
            }
        }
    }

    out
}

fn map_build_error(err: BuildStreamError) -> DeviceError {
    let message = err.to_string();
    match err {
        BuildStreamError::DeviceNotAvailable => DeviceError::Unavailable(message),
        BuildStreamError::StreamConfigNotSupported => DeviceError::UnsupportedFormat(message),
        _ => DeviceError::Io(message),
    }
}

fn map_play_error(err: PlayStreamError) -> DeviceError {
    let message = err.to_string();
    match err {
        PlayStreamError::DeviceNotAvailable => DeviceError::Unavailable(message),
        _ => DeviceError::Io(message),
    }
}
