//! Runtime events for monitoring relay health.
//!
//! Events are non-fatal notifications. The pipeline keeps running after an
//! event is emitted; they are for logging and counters, not error handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::device::Direction;

/// Runtime events emitted while relaying.
///
/// # Example
///
/// ```
/// use audio_relay::RelayEvent;
///
/// fn handle_event(event: RelayEvent) {
///     match event {
///         RelayEvent::CaptureOverflow { dropped_samples } => {
///             eprintln!("capture dropped {} samples", dropped_samples);
///         }
///         RelayEvent::PlaybackUnderrun { missing_samples } => {
///             eprintln!("playback starved for {} samples", missing_samples);
///         }
///         RelayEvent::FramingViolation { from, size, expected } => {
///             eprintln!("{}: {} byte datagram (want {})", from, size, expected);
///         }
///         RelayEvent::DefaultDeviceSubstituted { direction, query, used } => {
///             eprintln!("{} '{}' not found, using {}", direction, query, used);
///         }
///         RelayEvent::PeerSilent { waited } => {
///             eprintln!("nothing received for {:?}", waited);
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// The capture ring buffer was full and incoming samples were dropped.
    ///
    /// The relay is consuming frames slower than the device produces them.
    CaptureOverflow {
        /// Samples discarded by the device callback.
        dropped_samples: usize,
    },

    /// The playback callback ran out of queued audio and played silence.
    PlaybackUnderrun {
        /// Samples filled with silence.
        missing_samples: usize,
    },

    /// A datagram whose size is not exactly one frame was discarded.
    FramingViolation {
        /// Sender of the datagram.
        from: SocketAddr,
        /// Size actually received.
        size: usize,
        /// Size of one frame.
        expected: usize,
    },

    /// An optional device query matched nothing and the host default was used.
    DefaultDeviceSubstituted {
        /// Which side was being resolved.
        direction: Direction,
        /// The name fragment that matched nothing.
        query: String,
        /// Name of the device actually opened.
        used: String,
    },

    /// The network source waited a full liveness window without a frame.
    ///
    /// Loss is not detected at the datagram level; this only reports that
    /// the peer has gone quiet.
    PeerSilent {
        /// Length of the window that elapsed.
        waited: Duration,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one with [`RelayBuilder::on_event()`](crate::RelayBuilder::on_event)
/// or wrap one with [`RelayCounters::observe()`](crate::RelayCounters::observe).
pub type EventCallback = Arc<dyn Fn(RelayEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use audio_relay::{event_callback, RelayEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// callback(RelayEvent::CaptureOverflow { dropped_samples: 3 });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(RelayEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Logs an event and forwards it to the callback, if any.
pub(crate) fn emit(callback: Option<&EventCallback>, event: RelayEvent) {
    tracing::warn!(?event, "relay event");
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_relay_event_debug() {
        let event = RelayEvent::CaptureOverflow {
            dropped_samples: 100,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("CaptureOverflow"));
        assert!(debug.contains("100"));
    }

    #[test]
    fn test_relay_event_clone() {
        let event = RelayEvent::FramingViolation {
            from: "127.0.0.1:9000".parse().unwrap(),
            size: 100,
            expected: 4096,
        };
        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_emit_reaches_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback = event_callback(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(Some(&callback), RelayEvent::PlaybackUnderrun { missing_samples: 1 });
        emit(None, RelayEvent::PlaybackUnderrun { missing_samples: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
