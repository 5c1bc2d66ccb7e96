//! Recording bytes value object

use std::io::Cursor;

use hound::{WavReader, WavSpec};

/// The byte content of the recording file, as read back on demand.
///
/// Not cached between reads. A recording read while capture is still running
/// (or right after a forced stop) may be partial, so header access is
/// tolerant and never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    data: Vec<u8>,
}

impl Recording {
    /// Create a Recording from raw file bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// A recording that does not exist yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the raw file bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw file bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Probe the WAV header, if one is present and readable
    pub fn wav_spec(&self) -> Option<WavSpec> {
        if self.data.is_empty() {
            return None;
        }
        WavReader::new(Cursor::new(self.data.as_slice()))
            .ok()
            .map(|reader| reader.spec())
    }
}

impl From<Vec<u8>> for Recording {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}
