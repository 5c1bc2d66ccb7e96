//! Background capture: drains a capture line into the WAV recording file

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use hound::WavWriter;
use tokio::task::JoinHandle;

use crate::application::ports::CaptureLine;
use crate::domain::audio::AudioFormatSpec;
use crate::domain::capture::SessionId;

use super::AudioError;

/// Read size per device poll, rounded down to whole frames
const READ_CHUNK_BYTES: usize = 4096;

/// Handle to the running capture task of one session
pub(crate) struct CaptureTask {
    pub(crate) session: SessionId,
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    /// Disconnects once the task has stopped writing the file
    finished: Receiver<()>,
}

impl CaptureTask {
    pub(crate) fn new(
        session: SessionId,
        handle: JoinHandle<()>,
        cancel: Arc<AtomicBool>,
        finished: Receiver<()>,
    ) -> Self {
        Self {
            session,
            handle,
            cancel,
            finished,
        }
    }

    /// Ask the task to stop. Does not wait for it to acknowledge.
    pub(crate) fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    /// Wait up to `timeout` for the task's last write to land.
    ///
    /// Returns `false` if the task was still writing when the time ran out.
    pub(crate) fn wait_finished(self, timeout: Duration) -> bool {
        match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// Stream `line` into a fresh WAV file at `path` until cancelled or the line ends.
///
/// Returns the number of samples written. The header is flushed after every
/// chunk, so a concurrent reader sees a container describing what is on disk
/// so far; a cancellation landing mid-chunk can still leave a short tail.
pub(crate) fn drain_to_wav(
    line: &dyn CaptureLine,
    format: &AudioFormatSpec,
    path: &Path,
    cancel: &AtomicBool,
) -> Result<u64, AudioError> {
    let file = File::create(path).map_err(|e| {
        AudioError::CaptureFailed(format!("Failed to create {}: {}", path.display(), e))
    })?;
    let mut writer = WavWriter::new(BufWriter::new(file), format.wav_spec())
        .map_err(|e| AudioError::CaptureFailed(format!("Failed to write WAV header: {}", e)))?;
    writer
        .flush()
        .map_err(|e| AudioError::CaptureFailed(format!("Failed to write WAV header: {}", e)))?;

    let sample_width = format.bytes_per_sample();
    let chunk = (READ_CHUNK_BYTES / format.frame_size()).max(1) * format.frame_size();
    let mut buf = vec![0u8; chunk];
    let mut pending: Vec<u8> = Vec::with_capacity(chunk * 2);
    let mut written: u64 = 0;

    while !cancel.load(Ordering::SeqCst) {
        let n = line
            .read(&mut buf)
            .map_err(|e| AudioError::CaptureFailed(e.to_string()))?;
        if n == 0 {
            break;
        }

        pending.extend_from_slice(&buf[..n]);
        let whole = pending.len() - pending.len() % sample_width;
        for raw in pending[..whole].chunks_exact(sample_width) {
            write_sample(&mut writer, format.bits_per_sample(), format.decode_sample(raw))
                .map_err(|e| AudioError::CaptureFailed(format!("Failed to write audio data: {}", e)))?;
            written += 1;
        }
        pending.drain(..whole);

        writer
            .flush()
            .map_err(|e| AudioError::CaptureFailed(format!("Failed to write audio data: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| AudioError::CaptureFailed(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(written)
}

fn write_sample<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    bits_per_sample: u16,
    value: i32,
) -> hound::Result<()> {
    match bits_per_sample {
        8 => writer.write_sample(value as i8),
        16 => writer.write_sample(value as i16),
        _ => writer.write_sample(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::DeviceError;
    use crate::domain::audio::ByteOrder;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Line that replays scripted chunks, then reports end of stream
    struct ScriptedLine {
        chunks: Mutex<VecDeque<Result<Vec<u8>, DeviceError>>>,
    }

    impl ScriptedLine {
        fn new(chunks: Vec<Result<Vec<u8>, DeviceError>>) -> Self {
            Self {
                chunks: Mutex::new(chunks.into()),
            }
        }
    }

    impl CaptureLine for ScriptedLine {
        fn start(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
            match self.chunks.lock().unwrap().pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }

        fn stop(&self) {}

        fn close(&self) {}

        fn is_open(&self) -> bool {
            true
        }
    }

    fn session_id() -> SessionId {
        let mut session = crate::domain::capture::CaptureSession::new();
        session.begin_start().unwrap();
        session.mark_recording().unwrap()
    }

    fn format() -> AudioFormatSpec {
        AudioFormatSpec::new(8_000, 16, 1, true, ByteOrder::Big).unwrap()
    }

    #[test]
    fn writes_big_endian_device_bytes_as_wav_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        // Second sample is split across two reads
        let line = ScriptedLine::new(vec![Ok(vec![0x01, 0x00, 0xFF]), Ok(vec![0xFE])]);

        let written = drain_to_wav(&line, &format(), &path, &AtomicBool::new(false)).unwrap();
        assert_eq!(written, 2);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![256, -2]);
    }

    #[test]
    fn cancelled_before_first_read_leaves_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let line = ScriptedLine::new(vec![Ok(vec![0x00, 0x01])]);

        let written = drain_to_wav(&line, &format(), &path, &AtomicBool::new(true)).unwrap();
        assert_eq!(written, 0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 0);
        assert_eq!(reader.spec().bits_per_sample, 16);
    }

    #[test]
    fn device_error_becomes_capture_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let line = ScriptedLine::new(vec![Err(DeviceError::Io("overrun".to_string()))]);

        let err = drain_to_wav(&line, &format(), &path, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, AudioError::CaptureFailed(ref msg) if msg.contains("overrun")));
    }

    #[test]
    fn wait_finished_returns_once_the_writer_side_is_gone() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = runtime.spawn_blocking(move || drop(tx));
        let task = CaptureTask::new(session_id(), handle, Arc::new(AtomicBool::new(false)), rx);

        task.cancel();
        assert!(task.wait_finished(Duration::from_secs(2)));
    }

    #[test]
    fn wait_finished_gives_up_on_a_stuck_writer() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = runtime.spawn_blocking(|| {});
        let task = CaptureTask::new(session_id(), handle, Arc::new(AtomicBool::new(false)), rx);

        assert!(!task.wait_finished(Duration::from_millis(20)));
        drop(tx);
    }

    #[test]
    fn unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let line = ScriptedLine::new(vec![]);

        let err = drain_to_wav(&line, &format(), &path, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, AudioError::CaptureFailed(_)));
    }
}
