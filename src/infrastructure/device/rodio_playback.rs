//! Speaker playback using rodio

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use crate::application::ports::{DeviceError, PlaybackDevice, PlaybackLine};
use crate::domain::audio::WavClip;

/// Playback device backed by the default rodio output
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioPlaybackDevice;

impl RodioPlaybackDevice {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackDevice for RodioPlaybackDevice {
    fn open(&self, clip: WavClip) -> Result<Box<dyn PlaybackLine>, DeviceError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| DeviceError::Unavailable(format!("No output device: {}", e)))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| DeviceError::Unavailable(format!("Failed to open output: {}", e)))?;

        sink.pause();
        let channels = clip.channels();
        let sample_rate = clip.sample_rate();
        sink.append(SamplesBuffer::new(channels, sample_rate, clip.into_samples()));

        Ok(Box::new(RodioPlaybackLine {
            _stream: stream,
            sink,
        }))
    }
}

/// A loaded, initially paused output sink.
///
/// The output stream must outlive the sink, so it is held alongside it.
struct RodioPlaybackLine {
    _stream: OutputStream,
    sink: Sink,
}

impl PlaybackLine for RodioPlaybackLine {
    fn start(&mut self) -> Result<(), DeviceError> {
        self.sink.play();
        Ok(())
    }

    fn is_running(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn stop(&mut self) {
        self.sink.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec};

    #[test]
    #[ignore = "Requires audio hardware"]
    fn plays_short_tone_to_completion() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let samples = (0..800)
            .map(|i| (i as f32 * 0.1).sin() * 0.2)
            .collect::<Vec<_>>();
        let clip = WavClip::from_samples(spec, samples);

        let mut line = RodioPlaybackDevice::new().open(clip).unwrap();
        assert!(!line.is_running());
        line.start().unwrap();
        while line.is_running() {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        line.stop();
    }
}
