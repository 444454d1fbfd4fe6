//! CPAL-backed device catalog and stream configuration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange};

use super::{DeviceCatalog, DeviceDescriptor, Direction};
use crate::{AudioFormat, RelayError, RelayResult};

/// Catalog over the default CPAL host.
pub struct CpalCatalog {
    host: cpal::Host,
}

impl Default for CpalCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalCatalog {
    /// Catalog over `cpal::default_host()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Reopens the device a descriptor was resolved from.
    ///
    /// Tries the recorded enumeration position first and falls back to a
    /// name lookup if the host's device list has shifted since.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device has disappeared.
    pub fn open(&self, descriptor: &DeviceDescriptor) -> RelayResult<cpal::Device> {
        let mut devices: Vec<cpal::Device> =
            self.host.devices().map_err(RelayError::backend)?.collect();

        let same_slot = devices
            .get(descriptor.index)
            .is_some_and(|d| d.name().ok().as_deref() == Some(descriptor.name.as_str()));
        if same_slot {
            return Ok(devices.swap_remove(descriptor.index));
        }

        devices
            .into_iter()
            .find(|d| {
                d.name().ok().as_deref() == Some(descriptor.name.as_str())
                    && max_channels(d, descriptor.direction) >= descriptor.channels
            })
            .ok_or_else(|| RelayError::unavailable(&descriptor.name, "device no longer present"))
    }
}

impl DeviceCatalog for CpalCatalog {
    fn descriptors(&self) -> RelayResult<Vec<DeviceDescriptor>> {
        let devices = self.host.devices().map_err(RelayError::backend)?;

        let mut found = Vec::new();
        for (index, device) in devices.enumerate() {
            let Ok(name) = device.name() else {
                continue;
            };
            for direction in [Direction::Capture, Direction::Playback] {
                let channels = max_channels(&device, direction);
                if channels > 0 {
                    found.push(DeviceDescriptor {
                        name: name.clone(),
                        direction,
                        channels,
                        index,
                    });
                }
            }
        }
        Ok(found)
    }

    fn default_device(&self, direction: Direction) -> RelayResult<Option<DeviceDescriptor>> {
        let device = match direction {
            Direction::Capture => self.host.default_input_device(),
            Direction::Playback => self.host.default_output_device(),
        };
        let Some(device) = device else {
            return Ok(None);
        };
        let name = device.name().map_err(RelayError::backend)?;

        // Locate the default in enumeration order so `open` can find it again.
        let index = self
            .host
            .devices()
            .map_err(RelayError::backend)?
            .position(|d| d.name().ok().as_deref() == Some(name.as_str()))
            .unwrap_or(usize::MAX);

        Ok(Some(DeviceDescriptor {
            channels: max_channels(&device, direction),
            name,
            direction,
            index,
        }))
    }
}

fn supported_ranges(
    device: &cpal::Device,
    direction: Direction,
) -> RelayResult<Vec<SupportedStreamConfigRange>> {
    match direction {
        Direction::Capture => device
            .supported_input_configs()
            .map(Iterator::collect)
            .map_err(RelayError::backend),
        Direction::Playback => device
            .supported_output_configs()
            .map(Iterator::collect)
            .map_err(RelayError::backend),
    }
}

fn max_channels(device: &cpal::Device, direction: Direction) -> u16 {
    supported_ranges(device, direction)
        .unwrap_or_default()
        .iter()
        .map(SupportedStreamConfigRange::channels)
        .max()
        .unwrap_or(0)
}

/// State shared between a CPAL callback thread and the relay thread.
#[derive(Debug, Default)]
pub(crate) struct StreamHealth {
    xrun_samples: AtomicUsize,
    lost: AtomicBool,
}

impl StreamHealth {
    /// Records samples dropped (capture) or filled with silence (playback).
    pub fn add_xrun(&self, samples: usize) {
        if samples > 0 {
            self.xrun_samples.fetch_add(samples, Ordering::Relaxed);
        }
    }

    /// Returns and clears the xrun count.
    pub fn take_xrun(&self) -> usize {
        self.xrun_samples.swap(0, Ordering::Relaxed)
    }

    /// `true` once the backend reported the device gone.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    /// Error callback for `build_*_stream`.
    pub fn error_callback(
        self: &Arc<Self>,
        device: &str,
    ) -> impl FnMut(cpal::StreamError) + Send + 'static {
        let health = Arc::clone(self);
        let device = device.to_string();
        move |err| {
            tracing::error!(%device, "Audio stream error: {}", err);
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                health.lost.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// Stream parameters chosen for a device.
#[derive(Debug, Clone)]
pub(crate) struct StreamSetup {
    pub config: cpal::StreamConfig,
    pub sample_format: SampleFormat,
    /// Channels the device stream actually carries. May exceed the relay's
    /// channel count; extra channels are ignored on capture and zeroed on
    /// playback.
    pub device_channels: u16,
}

/// Picks a config that carries `format` natively.
///
/// Prefers an exact channel match, then i16 over f32, then fewer channels.
fn pick_config(
    ranges: &[SupportedStreamConfigRange],
    format: AudioFormat,
) -> Option<SupportedStreamConfig> {
    let rate = SampleRate(format.sample_rate);
    ranges
        .iter()
        .filter(|r| {
            r.channels() >= format.channels
                && r.min_sample_rate() <= rate
                && rate <= r.max_sample_rate()
                && matches!(r.sample_format(), SampleFormat::I16 | SampleFormat::F32)
        })
        .min_by_key(|r| {
            (
                r.channels() != format.channels,
                r.sample_format() != SampleFormat::I16,
                r.channels(),
            )
        })
        .map(|r| r.clone().with_sample_rate(rate))
}

/// Chooses stream parameters for `device` in `direction`.
///
/// # Errors
///
/// Returns `UnsupportedFormat` if no supported config carries the rate and
/// channel count as i16 or f32.
pub(crate) fn open_stream_config(
    device: &cpal::Device,
    direction: Direction,
    format: AudioFormat,
) -> RelayResult<StreamSetup> {
    let ranges = supported_ranges(device, direction)?;
    let supported = pick_config(&ranges, format).ok_or_else(|| RelayError::UnsupportedFormat {
        format: format!(
            "{direction} at {} Hz with {} channels as i16/f32",
            format.sample_rate, format.channels
        ),
    })?;

    let setup = StreamSetup {
        sample_format: supported.sample_format(),
        device_channels: supported.channels(),
        config: supported.config(),
    };
    tracing::debug!(
        %direction,
        sample_format = ?setup.sample_format,
        device_channels = setup.device_channels,
        "stream config selected"
    );
    Ok(setup)
}
