//! Configuration types for the relay.

use std::net::SocketAddr;
use std::time::Duration;

use crate::RelayError;

/// Name fragment of the capture device used when none is given.
pub const DEFAULT_INPUT_DEVICE: &str = "BlackHole 16ch";

/// Default low-pass cutoff in Hz.
pub const DEFAULT_CUTOFF_HZ: f64 = 1000.0;

/// The PCM format carried end-to-end: 16-bit signed, interleaved.
///
/// Every component receives this value explicitly instead of reading
/// module-level constants. [`AudioFormat::STANDARD`] is the only format the
/// relay speaks on the wire.
///
/// # Example
///
/// ```
/// use audio_relay::AudioFormat;
///
/// let format = AudioFormat::STANDARD;
/// assert_eq!(format.frame_bytes(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample-frames per block, per channel.
    pub block_len: usize,
}

impl AudioFormat {
    /// Stereo, 44.1 kHz, 1024-frame blocks.
    pub const STANDARD: Self = Self {
        sample_rate: 44_100,
        channels: 2,
        block_len: 1024,
    };

    /// Bytes per sample (i16).
    pub const SAMPLE_BYTES: usize = 2;

    /// Number of i16 samples in one frame (all channels).
    #[must_use]
    pub fn samples_per_frame(&self) -> usize {
        self.block_len * self.channels as usize
    }

    /// Size of one frame on the wire.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame() * Self::SAMPLE_BYTES
    }

    /// Wall-clock duration of one frame.
    #[must_use]
    pub fn frame_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.block_len as f64 / f64::from(self.sample_rate))
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Where the relay takes audio from and where it delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RelayMode {
    /// Capture device straight to playback device.
    #[default]
    Local,
    /// Capture device to a UDP peer.
    UdpSend {
        /// Peer that receives one datagram per frame.
        target: SocketAddr,
    },
    /// UDP peer to playback device.
    UdpReceive {
        /// Local address to bind.
        bind: SocketAddr,
    },
    /// Generated white noise to a playback device, or to a UDP peer when
    /// `target` is set.
    Noise {
        /// Optional UDP destination instead of the playback device.
        target: Option<SocketAddr>,
    },
}

/// Complete configuration of one relay instance.
///
/// Use [`RelayConfig::default()`] for the stock setup and override fields as
/// needed.
///
/// # Example
///
/// ```
/// use audio_relay::{RelayConfig, RelayMode};
///
/// let config = RelayConfig {
///     cutoff_hz: 2500.0,
///     mode: RelayMode::UdpSend { target: "127.0.0.1:5005".parse().unwrap() },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Case-insensitive name fragment of the capture device.
    ///
    /// A capture device that cannot be resolved is fatal.
    /// Default: `"BlackHole 16ch"`
    pub input_device: String,

    /// Case-insensitive name fragment of the playback device.
    ///
    /// `None` selects the host default. An unmatched name falls back to the
    /// host default with a [`RelayEvent::DefaultDeviceSubstituted`], unless
    /// `output_fallback` is off.
    ///
    /// [`RelayEvent::DefaultDeviceSubstituted`]: crate::RelayEvent::DefaultDeviceSubstituted
    pub output_device: Option<String>,

    /// Whether an unmatched `output_device` may fall back to the host default.
    /// When `false`, an unmatched name is a fatal `DeviceNotFound`.
    /// Default: `true`
    pub output_fallback: bool,

    /// Low-pass cutoff in Hz. Default: 1000.0
    pub cutoff_hz: f64,

    /// Whether this instance filters the frames it relays. Default: `true`
    pub filter_enabled: bool,

    /// Transport topology.
    pub mode: RelayMode,

    /// How long a network receive may wait before the pipeline gets control
    /// back to check for cancellation. Default: 1s
    pub recv_timeout: Duration,

    /// Capacity of the device ring buffers, in frames. Default: 8
    pub device_buffer_frames: usize,

    /// Fixed PCM format.
    pub format: AudioFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            input_device: DEFAULT_INPUT_DEVICE.to_string(),
            output_device: None,
            output_fallback: true,
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            filter_enabled: true,
            mode: RelayMode::default(),
            recv_timeout: Duration::from_secs(1),
            device_buffer_frames: 8,
            format: AudioFormat::STANDARD,
        }
    }
}

impl RelayConfig {
    /// Checks values that would otherwise fail deep inside the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCutoff` for a non-positive cutoff when filtering is
    /// enabled, and `InvalidConfig` for a zero timeout or buffer size.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.filter_enabled && !(self.cutoff_hz.is_finite() && self.cutoff_hz > 0.0) {
            return Err(RelayError::InvalidCutoff {
                cutoff_hz: self.cutoff_hz,
            });
        }
        if self.recv_timeout.is_zero() {
            return Err(RelayError::invalid_config("recv_timeout must be non-zero"));
        }
        if self.device_buffer_frames < 2 {
            return Err(RelayError::invalid_config(
                "device_buffer_frames must be at least 2",
            ));
        }
        if self.format != AudioFormat::STANDARD {
            return Err(RelayError::invalid_config(
                "only 16-bit stereo 44.1kHz with 1024-frame blocks is supported",
            ));
        }
        Ok(())
    }
}
