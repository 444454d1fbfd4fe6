//! Cancellation and run statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::event::{EventCallback, RelayEvent};

/// Shared stop flag checked by the pipeline at every iteration boundary.
///
/// Clones observe the same flag, so one can live in a signal handler while
/// another is passed to [`Pipeline::run`](crate::Pipeline::run).
///
/// # Example
///
/// ```
/// use audio_relay::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Statistics about one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames handed to the sink.
    pub frames_relayed: u64,
    /// Frames that went through the low-pass filter.
    pub frames_filtered: u64,
    /// Datagrams discarded for having the wrong size.
    pub framing_violations: u64,
    /// Capture overflow events.
    pub capture_overflows: u64,
    /// Playback underrun events.
    pub playback_underruns: u64,
    /// Times the source yielded without a frame.
    pub idle_polls: u64,
}

/// Counters shared between a pipeline and the event callback of its
/// endpoints.
#[derive(Debug, Default)]
pub struct RelayCounters {
    frames_relayed: AtomicU64,
    frames_filtered: AtomicU64,
    framing_violations: AtomicU64,
    capture_overflows: AtomicU64,
    playback_underruns: AtomicU64,
    idle_polls: AtomicU64,
}

impl RelayCounters {
    /// Fresh zeroed counters.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wraps `forward` in a callback that counts events before passing them on.
    ///
    /// Hand the result to every source and sink of a pipeline so their events
    /// show up in [`RelayStats`].
    pub fn observe(self: &Arc<Self>, forward: Option<EventCallback>) -> EventCallback {
        let counters = Arc::clone(self);
        Arc::new(move |event: RelayEvent| {
            counters.record(&event);
            if let Some(forward) = &forward {
                forward(event);
            }
        })
    }

    fn record(&self, event: &RelayEvent) {
        let counter = match event {
            RelayEvent::FramingViolation { .. } => &self.framing_violations,
            RelayEvent::CaptureOverflow { .. } => &self.capture_overflows,
            RelayEvent::PlaybackUnderrun { .. } => &self.playback_underruns,
            RelayEvent::DefaultDeviceSubstituted { .. } | RelayEvent::PeerSilent { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_relayed(&self, filtered: bool) {
        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        if filtered {
            self.frames_filtered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            framing_violations: self.framing_violations.load(Ordering::Relaxed),
            capture_overflows: self.capture_overflows.load(Ordering::Relaxed),
            playback_underruns: self.playback_underruns.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
        }
    }
}
