//! Decoded WAV clip handed to playback lines

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec};

/// A fully decoded WAV buffer.
///
/// The playback format is whatever the container declares; samples are
/// normalised to -1.0..=1.0 and interleaved.
#[derive(Debug, Clone)]
pub struct WavClip {
    spec: WavSpec,
    samples: Vec<f32>,
}

impl WavClip {
    /// Decode an in-memory WAV container
    pub fn decode(bytes: &[u8]) -> Result<Self, hound::Error> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let bits = spec.bits_per_sample.clamp(1, 32);
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self { spec, samples })
    }

    /// Build a clip from already decoded samples
    pub fn from_samples(spec: WavSpec, samples: Vec<f32>) -> Self {
        Self { spec, samples }
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn channels(&self) -> u16 {
        self.spec.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.spec.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playing time at the declared sample rate
    pub fn duration(&self) -> Duration {
        if self.spec.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.spec.sample_rate as f64)
    }
}
