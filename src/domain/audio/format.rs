//! Audio format profile value object

use std::fmt;

use hound::{SampleFormat, WavSpec};

use crate::domain::error::FormatError;

/// Default capture sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default capture bit depth
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Default capture channel count
pub const DEFAULT_CHANNELS: u16 = 1;

/// Byte order of raw device samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    Little,
    #[default]
    Big,
}

impl ByteOrder {
    /// Build from a "big endian" flag
    pub const fn from_big_endian(big_endian: bool) -> Self {
        if big_endian {
            Self::Big
        } else {
            Self::Little
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Little => "little-endian",
            Self::Big => "big-endian",
        }
    }
}

/// The fixed PCM profile used for every capture session.
///
/// Describes how a capture line lays out raw samples: rate, depth, channel
/// count, signedness and byte order. The WAV container written to disk is
/// always little-endian signed PCM (unsigned for 8 bit), so the byte order
/// and signedness only matter when decoding device bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormatSpec {
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
    signed: bool,
    byte_order: ByteOrder,
}

impl AudioFormatSpec {
    /// Create a validated format profile
    pub fn new(
        sample_rate: u32,
        bits_per_sample: u16,
        channels: u16,
        signed: bool,
        byte_order: ByteOrder,
    ) -> Result<Self, FormatError> {
        if sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if channels == 0 {
            return Err(FormatError::NoChannels);
        }
        if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(FormatError::UnsupportedBitDepth(bits_per_sample));
        }

        Ok(Self {
            sample_rate,
            bits_per_sample,
            channels,
            signed,
            byte_order,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    pub const fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Bytes occupied by one sample of one channel
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Bytes occupied by one frame (one sample per channel)
    pub const fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Raw device throughput in bytes per second
    pub const fn bytes_per_second(&self) -> u64 {
        self.frame_size() as u64 * self.sample_rate as u64
    }

    /// WAV container profile matching this format
    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }

    /// Decode one raw device sample into a signed value.
    ///
    /// `bytes` must hold exactly `bytes_per_sample()` bytes. Unsigned samples
    /// are re-centred around zero.
    pub fn decode_sample(&self, bytes: &[u8]) -> i32 {
        debug_assert_eq!(bytes.len(), self.bytes_per_sample());

        let raw = match self.byte_order {
            ByteOrder::Big => bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32),
            ByteOrder::Little => bytes.iter().rev().fold(0u32, |acc, &b| (acc << 8) | b as u32),
        };

        let bits = self.bits_per_sample as u32;
        if self.signed {
            let shift = 32 - bits;
            ((raw << shift) as i32) >> shift
        } else {
            (raw as i64 - (1i64 << (bits - 1))) as i32
        }
    }

    /// Quantise a normalised sample (-1.0..=1.0) into the raw device layout
    pub fn encode_sample(&self, value: f32, out: &mut Vec<u8>) {
        let bits = self.bits_per_sample as u32;
        let max = ((1i64 << (bits - 1)) - 1) as f64;
        let mut quantised = (value.clamp(-1.0, 1.0) as f64 * max).round() as i64;
        if !self.signed {
            quantised += 1i64 << (bits - 1);
        }
        let raw = quantised as u32;

        let width = self.bytes_per_sample();
        match self.byte_order {
            ByteOrder::Big => {
                for i in (0..width).rev() {
                    out.push((raw >> (8 * i)) as u8);
                }
            }
            ByteOrder::Little => {
                for i in 0..width {
                    out.push((raw >> (8 * i)) as u8);
                }
            }
        }
    }
}

impl Default for AudioFormatSpec {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            channels: DEFAULT_CHANNELS,
            signed: true,
            byte_order: ByteOrder::Big,
        }
    }
}

impl fmt::Display for AudioFormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{} channels", n),
        };
        write!(
            f,
            "{} Hz, {}-bit, {}, {}, {}",
            self.sample_rate,
            self.bits_per_sample,
            channels,
            if self.signed { "signed" } else { "unsigned" },
            self.byte_order.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(bits: u16, signed: bool, order: ByteOrder) -> AudioFormatSpec {
        AudioFormatSpec::new(16_000, bits, 1, signed, order).unwrap()
    }

    #[test]
    fn default_is_cd_rate_mono_big_endian() {
        let format = AudioFormatSpec::default();
        assert_eq!(format.sample_rate(), 44_100);
        assert_eq!(format.bits_per_sample(), 16);
        assert_eq!(format.channels(), 1);
        assert!(format.is_signed());
        assert_eq!(format.byte_order(), ByteOrder::Big);
        assert_eq!(format.frame_size(), 2);
    }

    #[test]
    fn rejects_invalid_profiles() {
        assert_eq!(
            AudioFormatSpec::new(16_000, 12, 1, true, ByteOrder::Little),
            Err(FormatError::UnsupportedBitDepth(12))
        );
        assert_eq!(
            AudioFormatSpec::new(16_000, 16, 0, true, ByteOrder::Little),
            Err(FormatError::NoChannels)
        );
        assert_eq!(
            AudioFormatSpec::new(0, 16, 1, true, ByteOrder::Little),
            Err(FormatError::ZeroSampleRate)
        );
    }

    #[test]
    fn decodes_signed_big_endian_16() {
        let format = spec(16, true, ByteOrder::Big);
        assert_eq!(format.decode_sample(&[0x01, 0x00]), 256);
        assert_eq!(format.decode_sample(&[0xFF, 0xFE]), -2);
    }

    #[test]
    fn decodes_signed_little_endian_24() {
        let format = spec(24, true, ByteOrder::Little);
        assert_eq!(format.decode_sample(&[0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(format.decode_sample(&[0x00, 0x00, 0x80]), -8_388_608);
    }

    #[test]
    fn decodes_unsigned_8_around_zero() {
        let format = spec(8, false, ByteOrder::Little);
        assert_eq!(format.decode_sample(&[128]), 0);
        assert_eq!(format.decode_sample(&[0]), -128);
        assert_eq!(format.decode_sample(&[255]), 127);
    }

    #[test]
    fn encode_respects_byte_order() {
        let mut big = Vec::new();
        spec(16, true, ByteOrder::Big).encode_sample(1.0, &mut big);
        assert_eq!(big, vec![0x7F, 0xFF]);

        let mut little = Vec::new();
        spec(16, true, ByteOrder::Little).encode_sample(1.0, &mut little);
        assert_eq!(little, vec![0xFF, 0x7F]);
    }

    #[test]
    fn encoded_silence_decodes_to_zero_for_unsigned() {
        let format = spec(16, false, ByteOrder::Big);
        let mut bytes = Vec::new();
        format.encode_sample(0.0, &mut bytes);
        assert_eq!(bytes, vec![0x80, 0x00]);
        assert_eq!(format.decode_sample(&bytes), 0);
    }

    #[test]
    fn wav_spec_matches_profile() {
        let format = AudioFormatSpec::new(22_050, 24, 2, true, ByteOrder::Big).unwrap();
        let wav = format.wav_spec();
        assert_eq!(wav.sample_rate, 22_050);
        assert_eq!(wav.bits_per_sample, 24);
        assert_eq!(wav.channels, 2);
        assert_eq!(wav.sample_format, SampleFormat::Int);
    }

    #[test]
    fn display_is_readable() {
        let text = AudioFormatSpec::default().to_string();
        assert_eq!(text, "44100 Hz, 16-bit, mono, signed, big-endian");
    }
}
