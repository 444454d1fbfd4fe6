//! Scripted frame source for testing without hardware.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::FrameSource;
use crate::{AudioFormat, AudioFrame, CancelToken, RelayError, RelayResult};

enum Step {
    Frame(AudioFrame),
    Idle,
    Fail(String),
}

/// A source that replays a script of frames, idle polls and failures.
///
/// When the script runs out the source yields `Ok(None)` forever. With
/// [`cancel_when_drained`](Self::cancel_when_drained) that first empty read
/// also cancels a token, so a pipeline run ends on its own after relaying
/// every scripted frame.
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFormat, FrameSource, MockSource};
///
/// let mut mock = MockSource::new(AudioFormat::STANDARD);
/// mock.generate_silence(2);
/// mock.generate_sine(440.0, 1);
///
/// assert_eq!(mock.remaining(), 3);
/// assert!(mock.next().unwrap().is_some());
/// ```
pub struct MockSource {
    format: AudioFormat,
    script: VecDeque<Step>,
    sine_phase: usize,
    cancel_on_drain: Option<CancelToken>,
}

impl MockSource {
    /// Creates an empty script for `format`.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            script: VecDeque::new(),
            sine_phase: 0,
            cancel_on_drain: None,
        }
    }

    /// Cancels `token` on the first read past the end of the script.
    #[must_use]
    pub fn cancel_when_drained(mut self, token: CancelToken) -> Self {
        self.cancel_on_drain = Some(token);
        self
    }

    /// Appends a frame.
    pub fn push_frame(&mut self, frame: AudioFrame) {
        self.script.push_back(Step::Frame(frame));
    }

    /// Appends an idle poll (`Ok(None)`).
    pub fn push_idle(&mut self) {
        self.script.push_back(Step::Idle);
    }

    /// Appends a fatal backend failure.
    pub fn push_failure(&mut self, reason: impl Into<String>) {
        self.script.push_back(Step::Fail(reason.into()));
    }

    /// Appends `frames` silent frames.
    pub fn generate_silence(&mut self, frames: usize) {
        for _ in 0..frames {
            self.push_frame(AudioFrame::silence(self.format));
        }
    }

    /// Appends `frames` frames of a full-scale sine, same on every channel.
    ///
    /// Phase continues across calls.
    pub fn generate_sine(&mut self, frequency: f64, frames: usize) {
        let sample_rate = f64::from(self.format.sample_rate);
        let channels = self.format.channels as usize;

        for _ in 0..frames {
            let mut frame = AudioFrame::silence(self.format);
            for sample_frame in frame.samples_mut().chunks_exact_mut(channels) {
                let t = self.sine_phase as f64 / sample_rate;
                let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
                sample_frame.fill((value * 32767.0) as i16);
                self.sine_phase += 1;
            }
            self.push_frame(frame);
        }
    }

    /// Appends `frames` frames of uniform noise within `±amplitude` of full
    /// scale (0.0 to 1.0). The same `seed` always yields the same frames.
    pub fn generate_noise(&mut self, frames: usize, amplitude: f64, seed: u64) {
        let peak = (amplitude.clamp(0.0, 1.0) * f64::from(i16::MAX)) as i16;
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..frames {
            let mut frame = AudioFrame::silence(self.format);
            for sample in frame.samples_mut() {
                *sample = rng.gen_range(-peak..=peak);
            }
            self.push_frame(frame);
        }
    }

    /// Steps left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn next(&mut self) -> RelayResult<Option<AudioFrame>> {
        let step = self.script.pop_front();
        if step.is_none() {
            if let Some(token) = &self.cancel_on_drain {
                token.cancel();
            }
        }
        match step {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Idle) | None => Ok(None),
            Some(Step::Fail(reason)) => Err(RelayError::BackendError(reason)),
        }
    }
}
