//! Tokio mpsc channel sink implementation.

use tokio::sync::mpsc;

use crate::sink::FrameSink;
use crate::{AudioFrame, RelayError, RelayResult};

/// A sink that sends frames to a tokio mpsc channel.
///
/// This is the way to get relayed audio into async code (analysis,
/// recording, custom transports). The pipeline thread blocks while the
/// channel is full, so the receiver's pace becomes the relay's pace.
///
/// `put` uses `blocking_send` and must not be called from inside an async
/// task; run the pipeline on a blocking thread (`spawn_blocking`).
///
/// # Example
///
/// ```
/// use audio_relay::{AudioFrame, ChannelSink};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<AudioFrame>(16);
/// let sink = ChannelSink::new(tx);
///
/// // Hand the sink to a pipeline, then:
/// // while let Some(frame) = rx.recv().await { ... }
/// ```
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<AudioFrame>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::Sender<AudioFrame>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel sink with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<AudioFrame>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl FrameSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&mut self, frame: &AudioFrame) -> RelayResult<()> {
        self.sender
            .blocking_send(frame.clone())
            .map_err(|_| RelayError::ChannelClosed)
    }
}
