//! Frame sinks.
//!
//! A [`FrameSink`] is any destination for relayed frames. The crate provides:
//!
//! - [`LocalPlayback`]: Plays frames on an output device
//! - [`NetworkPlayback`]: Sends each frame as one UDP datagram
//! - [`ChannelSink`]: Hands frames to a tokio mpsc channel
//!
//! You can implement the [`FrameSink`] trait for custom destinations.

mod channel;
mod device;
mod network;

pub use channel::ChannelSink;
pub use device::LocalPlayback;
pub use network::NetworkPlayback;

use crate::{AudioFormat, AudioFrame, RelayError, RelayResult};

/// A destination for audio frames.
///
/// # Implementation Notes
///
/// - `put` may block; that is how backpressure reaches the source
/// - Errors from `put` are fatal and abort the pipeline
/// - `finish` runs once after a clean stop; release or flush resources here
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFrame, FrameSink, RelayResult};
///
/// struct PrintSink;
///
/// impl FrameSink for PrintSink {
///     fn name(&self) -> &str {
///         "print"
///     }
///
///     fn put(&mut self, frame: &AudioFrame) -> RelayResult<()> {
///         println!("Received {} sample-frames", frame.frame_count());
///         Ok(())
///     }
/// }
/// ```
pub trait FrameSink {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Delivers one frame, blocking until the destination accepts it.
    fn put(&mut self, frame: &AudioFrame) -> RelayResult<()>;

    /// Called once after the pipeline stops cleanly.
    ///
    /// Default implementation does nothing.
    fn finish(&mut self) -> RelayResult<()> {
        Ok(())
    }
}

/// Rejects a frame built for any format other than `expected`.
pub(crate) fn check_frame_format(expected: AudioFormat, frame: &AudioFrame) -> RelayResult<()> {
    if frame.format() == expected {
        return Ok(());
    }
    Err(RelayError::FrameSizeMismatch {
        expected: expected.samples_per_frame(),
        actual: frame.samples().len(),
    })
}
