//! The relay loop.
//!
//! A [`Pipeline`] owns one source, one sink and an optional filter, and moves
//! frames between them on the calling thread:
//!
//! ```text
//! source.next() ──▶ filter.process() ──▶ sink.put()
//! ```
//!
//! There is no queue of its own; a slow sink blocks `put`, which delays the
//! next `next`, which lets the device ring buffer (or the socket buffer)
//! absorb the difference.

use std::sync::Arc;

use crate::session::RelayCounters;
use crate::sink::FrameSink;
use crate::source::FrameSource;
use crate::{CancelToken, LowPassFilter, RelayError, RelayResult, RelayStats};

/// Lifecycle of a [`Pipeline`].
///
/// ```text
/// Created ──run──▶ Running ──cancel──▶ Stopped
///                     └────fatal error─▶ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Endpoints acquired, not yet relaying.
    Created,
    /// Inside [`Pipeline::run`].
    Running,
    /// Cancelled cleanly. Endpoints released.
    Stopped,
    /// Ended by a fatal error. Endpoints released.
    Aborted,
}

/// Source, optional filter and sink, relayed until cancelled.
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFormat, AudioFrame, CancelToken, ChannelSink, MockSource, Pipeline};
/// use tokio::sync::mpsc;
///
/// let cancel = CancelToken::new();
/// let mut source = MockSource::new(AudioFormat::STANDARD).cancel_when_drained(cancel.clone());
/// source.generate_silence(3);
///
/// let (tx, mut rx) = mpsc::channel::<AudioFrame>(8);
/// let mut pipeline = Pipeline::new(Box::new(source), Box::new(ChannelSink::new(tx)));
///
/// let stats = pipeline.run(&cancel).unwrap();
/// assert_eq!(stats.frames_relayed, 3);
/// assert!(rx.try_recv().is_ok());
/// ```
pub struct Pipeline {
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
    filter: Option<LowPassFilter>,
    state: PipelineState,
    counters: Arc<RelayCounters>,
}

impl Pipeline {
    /// Creates an unfiltered pipeline in [`PipelineState::Created`].
    pub fn new(source: Box<dyn FrameSource>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            source: Some(source),
            sink: Some(sink),
            filter: None,
            state: PipelineState::Created,
            counters: RelayCounters::new(),
        }
    }

    /// Filters every frame between source and sink.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<LowPassFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Shares counters with the event callback given to the endpoints.
    ///
    /// See [`RelayCounters::observe`].
    #[must_use]
    pub fn with_counters(mut self, counters: Arc<RelayCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The filter, if one is installed.
    pub fn filter(&self) -> Option<&LowPassFilter> {
        self.filter.as_ref()
    }

    /// Statistics so far.
    pub fn stats(&self) -> RelayStats {
        self.counters.snapshot()
    }

    /// Relays frames until `cancel` fires or a fatal error occurs.
    ///
    /// The token is checked before every read and again after it, so a
    /// frame read when cancellation arrives is dropped rather than delivered.
    /// Endpoints are released before this returns, on every path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the pipeline is in
    /// [`PipelineState::Created`]. Any error from the source, filter or sink
    /// is returned after moving to [`PipelineState::Aborted`].
    pub fn run(&mut self, cancel: &CancelToken) -> RelayResult<RelayStats> {
        if self.state != PipelineState::Created {
            return Err(RelayError::InvalidState {
                operation: "run",
                state: self.state,
            });
        }
        let (Some(mut source), Some(mut sink)) = (self.source.take(), self.sink.take()) else {
            return Err(RelayError::InvalidState {
                operation: "run",
                state: self.state,
            });
        };

        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
        self.state = PipelineState::Running;
        tracing::info!(
            source = source.name(),
            sink = sink.name(),
            cutoff_hz = ?self.filter.as_ref().map(LowPassFilter::cutoff_hz),
            "relay started"
        );

        let result = self
            .relay(source.as_mut(), sink.as_mut(), cancel)
            .and_then(|()| sink.finish());

        // Release the endpoints before reporting.
        drop(source);
        drop(sink);

        let stats = self.stats();
        match result {
            Ok(()) => {
                self.state = PipelineState::Stopped;
                tracing::info!(
                    frames = stats.frames_relayed,
                    framing_violations = stats.framing_violations,
                    overflows = stats.capture_overflows,
                    underruns = stats.playback_underruns,
                    "relay stopped"
                );
                Ok(stats)
            }
            Err(e) => {
                self.state = PipelineState::Aborted;
                tracing::error!(frames = stats.frames_relayed, "relay aborted: {}", e);
                Err(e)
            }
        }
    }

    fn relay(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> RelayResult<()> {
        while !cancel.is_cancelled() {
            let Some(mut frame) = source.next()? else {
                self.counters.idle_poll();
                continue;
            };
            if cancel.is_cancelled() {
                break;
            }

            let filtered = match &mut self.filter {
                Some(filter) => {
                    filter.process(&mut frame)?;
                    true
                }
                None => false,
            };
            sink.put(&frame)?;
            self.counters.frame_relayed(filtered);
        }
        Ok(())
    }
}
