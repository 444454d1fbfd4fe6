//! First-order IIR low-pass filter.
//!
//! Each channel runs the recurrence `y[n] = y[n-1] + alpha * (x[n] - y[n-1])`
//! with `alpha = dt / (rc + dt)`, `dt = 1 / sample_rate` and
//! `rc = 1 / (2π · cutoff)`. The accumulator stays in f64 across frames;
//! only the emitted samples are rounded and saturated to i16.

use crate::format::round_clamp_i16;
use crate::{AudioFormat, AudioFrame, RelayError};

/// Per-channel accumulators of a [`LowPassFilter`].
///
/// Starts at zero and is only cleared through [`FilterState::reset`], which
/// the pipeline calls when it is restarted.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    values: Vec<f64>,
}

impl FilterState {
    /// Zeroed state for `channels` channels.
    #[must_use]
    pub fn new(channels: u16) -> Self {
        Self {
            values: vec![0.0; channels as usize],
        }
    }

    /// Current accumulator of every channel.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of channels tracked.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.values.len()
    }

    /// Returns every accumulator to zero.
    pub fn reset(&mut self) {
        self.values.fill(0.0);
    }
}

/// Stateful low-pass filter applied in place to interleaved frames.
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFormat, AudioFrame, LowPassFilter};
///
/// let format = AudioFormat::STANDARD;
/// let mut filter = LowPassFilter::new(1000.0, format).unwrap();
/// let mut frame = AudioFrame::silence(format);
/// filter.process(&mut frame).unwrap();
/// assert!(frame.samples().iter().all(|&s| s == 0));
/// ```
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    cutoff_hz: f64,
    alpha: f64,
    state: FilterState,
}

impl LowPassFilter {
    /// Builds a filter for `format`, computing the smoothing factor once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCutoff` if `cutoff_hz` is not positive and finite,
    /// and `InvalidConfig` for a format without channels or sample rate.
    pub fn new(cutoff_hz: f64, format: AudioFormat) -> Result<Self, RelayError> {
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
            return Err(RelayError::InvalidCutoff { cutoff_hz });
        }
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(RelayError::invalid_config(
                "filter needs at least one channel and a non-zero sample rate",
            ));
        }

        let dt = 1.0 / f64::from(format.sample_rate);
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        let alpha = dt / (rc + dt);
        tracing::debug!(cutoff_hz, alpha, "low-pass filter configured");

        Ok(Self {
            cutoff_hz,
            alpha,
            state: FilterState::new(format.channels),
        })
    }

    /// Cutoff frequency in Hz.
    #[must_use]
    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    /// Smoothing factor in (0, 1).
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Read-only view of the accumulators.
    #[must_use]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Clears the accumulators.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Filters one frame in place.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if the frame's channel count differs from
    /// the filter's; the frame and the state are left untouched.
    pub fn process(&mut self, frame: &mut AudioFrame) -> Result<(), RelayError> {
        let channels = usize::from(frame.format().channels);
        if channels != self.state.channels() {
            return Err(RelayError::UnsupportedFormat {
                format: format!(
                    "{channels}-channel frame through a {}-channel filter",
                    self.state.channels()
                ),
            });
        }
        // A frame always holds whole sample-frames.
        self.run(frame.samples_mut());
        Ok(())
    }

    /// Filters an interleaved buffer in place.
    ///
    /// Consecutive calls continue from the state the previous call left, so a
    /// signal may be split at any sample-frame boundary.
    ///
    /// # Errors
    ///
    /// Returns `FrameSizeMismatch` if `samples` does not hold a whole number
    /// of sample-frames; the state is left untouched.
    pub fn process_interleaved(&mut self, samples: &mut [i16]) -> Result<(), RelayError> {
        let channels = self.state.channels();
        if samples.len() % channels != 0 {
            return Err(RelayError::FrameSizeMismatch {
                expected: samples.len() - samples.len() % channels,
                actual: samples.len(),
            });
        }
        self.run(samples);
        Ok(())
    }

    fn run(&mut self, samples: &mut [i16]) {
        let alpha = self.alpha;
        let channels = self.state.channels();
        for sample_frame in samples.chunks_exact_mut(channels) {
            for (sample, acc) in sample_frame.iter_mut().zip(self.state.values.iter_mut()) {
                *acc += alpha * (f64::from(*sample) - *acc);
                *sample = round_clamp_i16(*acc);
            }
        }
    }
}
