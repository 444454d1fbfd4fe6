//! Error types for audio-relay.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`RelayError`]): Stop the pipeline or prevent it from starting
//! - **Recoverable events**: Runtime issues surfaced via [`EventCallback`](crate::EventCallback)

use std::net::SocketAddr;

use crate::device::Direction;
use crate::pipeline::PipelineState;

/// Convenience alias used throughout the crate.
pub type RelayResult<T> = Result<T, RelayError>;

/// Fatal errors raised while acquiring endpoints or relaying frames.
///
/// A pipeline that sees one of these moves to
/// [`PipelineState::Aborted`]. Runtime conditions the relay can ride out
/// (overflow, underrun, malformed datagrams) are reported through the event
/// callback instead.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No endpoint matched a mandatory device query.
    #[error("{direction} device not found: {query}")]
    DeviceNotFound {
        /// The name fragment that was searched for.
        query: String,
        /// Which side was being resolved.
        direction: Direction,
    },

    /// The host has no default device for this direction.
    #[error("no default {direction} device configured")]
    NoDefaultDevice {
        /// Which side was being resolved.
        direction: Direction,
    },

    /// The endpoint was resolved but could not be opened.
    #[error("device unavailable: {name} - {reason}")]
    DeviceUnavailable {
        /// Name of the unavailable device.
        name: String,
        /// Reason the device is unavailable.
        reason: String,
    },

    /// The device cannot stream the fixed PCM format.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// The low-pass cutoff is not a positive finite frequency.
    #[error("invalid cutoff frequency: {cutoff_hz} Hz (must be positive and finite)")]
    InvalidCutoff {
        /// The rejected cutoff.
        cutoff_hz: f64,
    },

    /// A buffer did not hold exactly one frame.
    #[error("frame size mismatch: expected {expected} samples, got {actual}")]
    FrameSizeMismatch {
        /// Required length.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A UDP socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Socket send/receive failure.
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The receiving end of a channel sink was dropped.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation was attempted in the wrong lifecycle state.
    #[error("cannot {operation} a pipeline in state {state:?}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// State the pipeline was in.
        state: PipelineState,
    },

    /// Configuration values that cannot be honored.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
}

impl RelayError {
    /// Creates a backend error from any displayable CPAL error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::BackendError(err.to_string())
    }

    /// Creates a device unavailable error.
    pub fn unavailable(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DeviceUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found_display() {
        let err = RelayError::DeviceNotFound {
            query: "BlackHole".to_string(),
            direction: Direction::Capture,
        };
        assert_eq!(err.to_string(), "capture device not found: BlackHole");
    }

    #[test]
    fn test_invalid_cutoff_display() {
        let err = RelayError::InvalidCutoff { cutoff_hz: -1.0 };
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_unavailable_helper() {
        let err = RelayError::unavailable("USB Interface", "busy");
        assert_eq!(err.to_string(), "device unavailable: USB Interface - busy");
    }

    #[test]
    fn test_bind_error_keeps_source() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = RelayError::Bind {
            addr: "127.0.0.1:5005".parse().unwrap(),
            source: io_err,
        };
        assert!(err.to_string().contains("127.0.0.1:5005"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
