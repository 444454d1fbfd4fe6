//! Frame sources.
//!
//! A [`FrameSource`] yields one [`AudioFrame`] at a time, blocking until a
//! whole frame is available. Local devices, UDP peers, generated noise and
//! scripted test input all sit behind the same trait so the pipeline never
//! knows which one it is reading.

mod device;
mod mock;
mod network;
mod noise;

pub use device::LocalCapture;
pub use mock::MockSource;
pub use network::NetworkCapture;
pub use noise::NoiseSource;

use crate::{AudioFrame, RelayResult};

/// A blocking producer of audio frames.
///
/// Implementations are driven from a single thread and need not be `Send`;
/// device-backed sources hold CPAL streams that must stay on the thread that
/// created them.
pub trait FrameSource {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Blocks until one frame is available.
    ///
    /// `Ok(None)` means the source's liveness window elapsed without a frame.
    /// It is not an error; it gives the caller a chance to check for
    /// cancellation before calling again.
    fn next(&mut self) -> RelayResult<Option<AudioFrame>>;
}
