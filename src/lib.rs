//! # audio-relay
//!
//! Low-latency PCM relay between audio devices and UDP peers.
//!
//! `audio-relay` takes audio from a capture source, optionally smooths it
//! with a first-order low-pass filter, and hands it to a playback sink.
//! Either end can be a local device (via CPAL) or a UDP peer, so the same
//! pipeline runs a local monitor, a sender, or a receiver.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use audio_relay::{CancelToken, RelayBuilder, RelayConfig, RelayMode};
//!
//! let config = RelayConfig {
//!     input_device: "BlackHole".into(),
//!     cutoff_hz: 1500.0,
//!     mode: RelayMode::UdpSend { target: "192.168.1.20:5005".parse()? },
//!     ..Default::default()
//! };
//!
//! let cancel = CancelToken::new();
//! let mut pipeline = RelayBuilder::new(config)
//!     .on_event(|e| tracing::warn!(?e, "relay event"))
//!     .build()?;
//!
//! // Blocks until `cancel.cancel()` is called from elsewhere.
//! let stats = pipeline.run(&cancel)?;
//! ```
//!
//! ## Wire Format
//!
//! One UDP datagram carries exactly one frame: 1024 sample-frames of
//! interleaved stereo i16, little-endian, 4096 bytes, no header. Datagrams
//! of any other size are discarded.
//!
//! ## Architecture
//!
//! - **CPAL Thread**: Device callbacks that never block, exchanging samples
//!   through lock-free ring buffers
//! - **Relay Thread**: One blocking loop, `source → filter → sink`
//! - **Cancellation**: A shared [`CancelToken`] checked between frames

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod device;
mod error;
mod event;
mod filter;
pub mod format;
mod frame;
mod net;
mod pipeline;
mod session;
mod sink;
mod source;

pub use builder::RelayBuilder;
pub use config::{AudioFormat, RelayConfig, RelayMode, DEFAULT_CUTOFF_HZ, DEFAULT_INPUT_DEVICE};
pub use device::{
    CpalCatalog, DeviceCatalog, DeviceConfig, DeviceDescriptor, Direction, StaticCatalog,
};
pub use error::{RelayError, RelayResult};
pub use event::{event_callback, EventCallback, RelayEvent};
pub use filter::{FilterState, LowPassFilter};
pub use frame::AudioFrame;
pub use pipeline::{Pipeline, PipelineState};
pub use session::{CancelToken, RelayCounters, RelayStats};
pub use sink::{ChannelSink, FrameSink, LocalPlayback, NetworkPlayback};
pub use source::{FrameSource, LocalCapture, MockSource, NetworkCapture, NoiseSource};
