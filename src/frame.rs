//! Fixed-size block of interleaved PCM samples.

use std::time::Duration;

use crate::{AudioFormat, RelayError};

/// One block of audio: `block_len` sample-frames of interleaved i16.
///
/// `AudioFrame` is the unit that flows from a source, through the filter, to
/// a sink. Its length always matches its [`AudioFormat`], so a frame can be
/// put on the wire without further checks.
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFormat, AudioFrame};
///
/// let frame = AudioFrame::silence(AudioFormat::STANDARD);
/// assert_eq!(frame.frame_count(), 1024);
/// assert_eq!(frame.to_le_bytes().len(), 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    format: AudioFormat,
}

impl AudioFrame {
    /// Wraps samples that must hold exactly one frame.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if `samples.len()` differs from
    /// `format.samples_per_frame()`.
    pub fn new(samples: Vec<i16>, format: AudioFormat) -> Result<Self, RelayError> {
        let expected = format.samples_per_frame();
        if samples.len() != expected {
            return Err(RelayError::FrameSizeMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self { samples, format })
    }

    /// An all-zero frame.
    #[must_use]
    pub fn silence(format: AudioFormat) -> Self {
        Self {
            samples: vec![0; format.samples_per_frame()],
            format,
        }
    }

    /// Decodes a frame from little-endian wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` (counted in samples) unless
    /// `bytes.len() == format.frame_bytes()`.
    pub fn from_le_bytes(bytes: &[u8], format: AudioFormat) -> Result<Self, RelayError> {
        if bytes.len() != format.frame_bytes() {
            return Err(RelayError::FrameSizeMismatch {
                expected: format.samples_per_frame(),
                actual: bytes.len() / AudioFormat::SAMPLE_BYTES,
            });
        }
        let samples = bytes
            .chunks_exact(AudioFormat::SAMPLE_BYTES)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self { samples, format })
    }

    /// Encodes the frame as little-endian wire bytes.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.format.frame_bytes());
        self.write_le_bytes(&mut buf);
        buf
    }

    /// Appends the little-endian encoding to `buf` after clearing it.
    ///
    /// Lets a sink reuse one allocation for every frame it sends.
    pub fn write_le_bytes(&self, buf: &mut Vec<u8>) {
        buf.clear();
        buf.reserve(self.format.frame_bytes());
        for sample in &self.samples {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
    }

    /// Interleaved samples.
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Mutable access for in-place processing. The length cannot change.
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Consumes the frame, returning its samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    /// The format this frame was built for.
    #[must_use]
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Number of sample-frames (samples per channel).
    #[must_use]
    pub fn frame_count(&self) -> usize {
        if self.format.channels == 0 {
            return 0;
        }
        self.samples.len() / self.format.channels as usize
    }

    /// Wall-clock duration of the frame.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.format.frame_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_short_buffer() {
        let err = AudioFrame::new(vec![0; 100], AudioFormat::STANDARD).unwrap_err();
        assert!(matches!(
            err,
            RelayError::FrameSizeMismatch {
                expected: 2048,
                actual: 100
            }
        ));
    }

    #[test]
    fn test_from_le_bytes_rejects_wrong_length() {
        let result = AudioFrame::from_le_bytes(&[0u8; 100], AudioFormat::STANDARD);
        assert!(matches!(result, Err(RelayError::FrameSizeMismatch { .. })));

        let result = AudioFrame::from_le_bytes(&[0u8; 4097], AudioFormat::STANDARD);
        assert!(result.is_err());
    }

    #[test]
    fn test_wire_layout_is_little_endian_interleaved() {
        let mut samples = vec![0i16; 2048];
        samples[0] = 0x0102; // left
        samples[1] = -2; // right
        let frame = AudioFrame::new(samples, AudioFormat::STANDARD).unwrap();

        let bytes = frame.to_le_bytes();
        assert_eq!(bytes.len(), 4096);
        assert_eq!(&bytes[..4], &[0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_extremes_survive_wire_encoding() {
        let samples: Vec<i16> = (0..2048)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let frame = AudioFrame::new(samples.clone(), AudioFormat::STANDARD).unwrap();

        let decoded = AudioFrame::from_le_bytes(&frame.to_le_bytes(), AudioFormat::STANDARD).unwrap();
        assert_eq!(decoded.samples(), samples.as_slice());
    }

    #[test]
    fn test_write_le_bytes_reuses_buffer() {
        let frame = AudioFrame::silence(AudioFormat::STANDARD);
        let mut buf = vec![0xAAu8; 10];
        frame.write_le_bytes(&mut buf);
        assert_eq!(buf.len(), 4096);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_frame_count_and_duration() {
        let frame = AudioFrame::silence(AudioFormat::STANDARD);
        assert_eq!(frame.frame_count(), 1024);
        assert_eq!(frame.duration(), AudioFormat::STANDARD.frame_duration());
    }
}
