//! White-noise test signal.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
use crate::{AudioFormat, AudioFrame, RelayResult};

/// Full-scale white noise, uniform over the whole i16 range.
///
/// Paced to real time by default, one frame per frame duration, so it can
/// stand in for a capture device when feeding a playback device or a peer.
/// Useful for checking a link and hearing the filter at work.
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFormat, FrameSource, NoiseSource};
///
/// let mut noise = NoiseSource::seeded(AudioFormat::STANDARD, 7).unpaced();
/// let frame = noise.next().unwrap().unwrap();
/// assert_eq!(frame.frame_count(), 1024);
/// ```
pub struct NoiseSource {
    format: AudioFormat,
    rng: StdRng,
    paced: bool,
    next_due: Option<Instant>,
}

impl NoiseSource {
    /// Noise seeded from OS entropy.
    pub fn new(format: AudioFormat) -> Self {
        Self::with_rng(format, StdRng::from_entropy())
    }

    /// Reproducible noise.
    pub fn seeded(format: AudioFormat, seed: u64) -> Self {
        Self::with_rng(format, StdRng::seed_from_u64(seed))
    }

    fn with_rng(format: AudioFormat, rng: StdRng) -> Self {
        Self {
            format,
            rng,
            paced: true,
            next_due: None,
        }
    }

    /// Produces frames as fast as they are read.
    #[must_use]
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    fn wait_for_slot(&mut self) {
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        // A late reader does not get a burst of catch-up frames.
        self.next_due = Some(due.max(now) + self.format.frame_duration());
    }
}

impl FrameSource for NoiseSource {
    fn name(&self) -> &str {
        "white-noise"
    }

    fn next(&mut self) -> RelayResult<Option<AudioFrame>> {
        if self.paced {
            self.wait_for_slot();
        }
        let mut frame = AudioFrame::silence(self.format);
        self.rng.fill(frame.samples_mut());
        Ok(Some(frame))
    }
}
