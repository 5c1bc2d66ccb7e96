//! Audio domain module

mod clip;
mod format;
mod recording;

pub use clip::WavClip;
pub use format::{
    AudioFormatSpec, ByteOrder, DEFAULT_BITS_PER_SAMPLE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE,
};
pub use recording::Recording;
