//! Device resolution.
//!
//! A [`DeviceCatalog`] turns a human-supplied name fragment into a concrete
//! [`DeviceDescriptor`]. [`CpalCatalog`] reads the host audio subsystem;
//! [`StaticCatalog`] serves a fixed list for tests and embedding.

mod host;

pub use host::CpalCatalog;
pub(crate) use host::{open_stream_config, StreamHealth, StreamSetup};

use std::fmt;
use std::time::Duration;

use crate::event::{emit, EventCallback, RelayEvent};
use crate::{AudioFormat, RelayError, RelayResult};

/// Which way audio flows through an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Audio input (microphone, loopback device).
    Capture,
    /// Audio output (speakers, virtual output).
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// A resolved endpoint. Immutable once returned by a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Display name as reported by the host.
    pub name: String,
    /// Direction this descriptor was resolved for.
    pub direction: Direction,
    /// Maximum channel count in that direction.
    pub channels: u16,
    /// Position in host enumeration order, used to reopen the same device.
    pub index: usize,
}

impl DeviceDescriptor {
    /// Case-insensitive substring match on the display name.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Source of endpoint descriptors.
///
/// Implementors only enumerate; matching and fallback policy live in the
/// provided methods so every catalog resolves the same way.
pub trait DeviceCatalog {
    /// Every endpoint in host enumeration order, one descriptor per usable
    /// direction.
    fn descriptors(&self) -> RelayResult<Vec<DeviceDescriptor>>;

    /// The host default endpoint for `direction`, if any.
    fn default_device(&self, direction: Direction) -> RelayResult<Option<DeviceDescriptor>>;

    /// First endpoint whose name contains `query` (case-insensitive) and that
    /// offers at least `channels` channels in `direction`.
    ///
    /// `Ok(None)` means nothing matched; the caller decides whether that is
    /// fatal.
    fn resolve(
        &self,
        query: &str,
        direction: Direction,
        channels: u16,
    ) -> RelayResult<Option<DeviceDescriptor>> {
        Ok(self
            .descriptors()?
            .into_iter()
            .find(|d| d.direction == direction && d.channels >= channels && d.matches(query)))
    }

    /// Resolves an endpoint that must exist.
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` when nothing matches.
    fn resolve_required(
        &self,
        query: &str,
        direction: Direction,
        format: AudioFormat,
    ) -> RelayResult<DeviceDescriptor> {
        self.resolve(query, direction, format.channels)?
            .ok_or_else(|| RelayError::DeviceNotFound {
                query: query.to_string(),
                direction,
            })
    }

    /// Resolves an optional endpoint, falling back to the host default.
    ///
    /// An unmatched query emits [`RelayEvent::DefaultDeviceSubstituted`].
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultDevice` if the fallback is needed and the host has
    /// none, and `UnsupportedFormat` if the default lacks enough channels.
    fn resolve_or_default(
        &self,
        query: Option<&str>,
        direction: Direction,
        format: AudioFormat,
        events: Option<&EventCallback>,
    ) -> RelayResult<DeviceDescriptor> {
        if let Some(query) = query {
            if let Some(found) = self.resolve(query, direction, format.channels)? {
                return Ok(found);
            }
        }

        let fallback = self
            .default_device(direction)?
            .ok_or(RelayError::NoDefaultDevice { direction })?;
        if fallback.channels < format.channels {
            return Err(RelayError::UnsupportedFormat {
                format: format!(
                    "default {direction} device '{}' has {} channels, need {}",
                    fallback.name, fallback.channels, format.channels
                ),
            });
        }

        if let Some(query) = query {
            emit(
                events,
                RelayEvent::DefaultDeviceSubstituted {
                    direction,
                    query: query.to_string(),
                    used: fallback.name.clone(),
                },
            );
        }
        Ok(fallback)
    }
}

/// In-memory catalog.
///
/// The default for each direction is the first descriptor in that direction
/// unless set explicitly.
///
/// # Example
///
/// ```
/// use audio_relay::{DeviceCatalog, Direction, StaticCatalog};
///
/// let catalog = StaticCatalog::new()
///     .with_device("BlackHole 16ch", 16, 16)
///     .with_device("MacBook Pro Speakers", 0, 2);
///
/// let found = catalog.resolve("speakers", Direction::Playback, 2).unwrap().unwrap();
/// assert_eq!(found.name, "MacBook Pro Speakers");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    devices: Vec<(String, u16, u16)>,
    default_input: Option<usize>,
    default_output: Option<usize>,
}

impl StaticCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a device with its maximum input and output channel counts.
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>, inputs: u16, outputs: u16) -> Self {
        self.devices.push((name.into(), inputs, outputs));
        self
    }

    /// Marks the device at `index` as the host default for `direction`.
    #[must_use]
    pub fn with_default(mut self, direction: Direction, index: usize) -> Self {
        match direction {
            Direction::Capture => self.default_input = Some(index),
            Direction::Playback => self.default_output = Some(index),
        }
        self
    }

    fn descriptor(&self, index: usize, direction: Direction) -> Option<DeviceDescriptor> {
        let (name, inputs, outputs) = self.devices.get(index)?;
        let channels = match direction {
            Direction::Capture => *inputs,
            Direction::Playback => *outputs,
        };
        (channels > 0).then(|| DeviceDescriptor {
            name: name.clone(),
            direction,
            channels,
            index,
        })
    }
}

impl DeviceCatalog for StaticCatalog {
    fn descriptors(&self) -> RelayResult<Vec<DeviceDescriptor>> {
        Ok((0..self.devices.len())
            .flat_map(|i| {
                [
                    self.descriptor(i, Direction::Capture),
                    self.descriptor(i, Direction::Playback),
                ]
            })
            .flatten()
            .collect())
    }

    fn default_device(&self, direction: Direction) -> RelayResult<Option<DeviceDescriptor>> {
        let explicit = match direction {
            Direction::Capture => self.default_input,
            Direction::Playback => self.default_output,
        };
        Ok(match explicit {
            Some(index) => self.descriptor(index, direction),
            None => (0..self.devices.len()).find_map(|i| self.descriptor(i, direction)),
        })
    }
}

/// Settings shared by device-backed sources and sinks.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// PCM format requested from the device.
    pub format: AudioFormat,
    /// Ring buffer capacity in frames.
    pub buffer_frames: usize,
    /// Sleep between ring buffer checks while blocked.
    pub poll_interval: Duration,
    /// Longest a capture waits for a frame before yielding `Ok(None)`.
    pub idle_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let format = AudioFormat::STANDARD;
        Self {
            format,
            buffer_frames: 8,
            // Half a frame keeps the added latency well under one block.
            poll_interval: format.frame_duration() / 2,
            idle_timeout: Duration::from_secs(1),
        }
    }
}

impl DeviceConfig {
    /// Ring buffer capacity in samples.
    #[must_use]
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames.max(2) * self.format.samples_per_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn studio() -> StaticCatalog {
        StaticCatalog::new()
            .with_device("BlackHole 16ch", 16, 16)
            .with_device("MacBook Pro Speakers", 0, 2)
            .with_device("USB Mono Mic", 1, 0)
    }

    #[test]
    fn test_resolve_case_insensitive_substring() {
        let catalog = studio();
        let found = catalog
            .resolve("blackhole", Direction::Capture, 2)
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "BlackHole 16ch");
        assert_eq!(found.channels, 16);
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_resolve_checks_direction_capability() {
        let catalog = studio();
        assert!(catalog
            .resolve("speakers", Direction::Capture, 2)
            .unwrap()
            .is_none());
        let found = catalog
            .resolve("Speakers", Direction::Playback, 2)
            .unwrap()
            .unwrap();
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_resolve_checks_channel_count() {
        let catalog = studio();
        assert!(catalog.resolve("mic", Direction::Capture, 2).unwrap().is_none());
        assert!(catalog.resolve("mic", Direction::Capture, 1).unwrap().is_some());
    }

    #[test]
    fn test_first_match_wins() {
        let catalog = StaticCatalog::new()
            .with_device("Interface A", 2, 2)
            .with_device("Interface B", 2, 2);
        let found = catalog
            .resolve("interface", Direction::Playback, 2)
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Interface A");
    }

    #[test]
    fn test_resolve_required_not_found() {
        let err = studio()
            .resolve_required("Scarlett", Direction::Capture, AudioFormat::STANDARD)
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::DeviceNotFound {
                direction: Direction::Capture,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_or_default_substitutes_with_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callback = crate::event_callback(move |e| seen_clone.lock().unwrap().push(e));

        let catalog = studio().with_default(Direction::Playback, 1);
        let found = catalog
            .resolve_or_default(
                Some("Scarlett"),
                Direction::Playback,
                AudioFormat::STANDARD,
                Some(&callback),
            )
            .unwrap();

        assert_eq!(found.name, "MacBook Pro Speakers");
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[RelayEvent::DefaultDeviceSubstituted {
                direction: Direction::Playback,
                query: "Scarlett".to_string(),
                used: "MacBook Pro Speakers".to_string(),
            }]
        );
    }

    #[test]
    fn test_resolve_or_default_without_query_is_silent() {
        let seen = Arc::new(Mutex::new(0usize));
        let seen_clone = seen.clone();
        let callback = crate::event_callback(move |_| *seen_clone.lock().unwrap() += 1);

        let found = studio()
            .resolve_or_default(None, Direction::Playback, AudioFormat::STANDARD, Some(&callback))
            .unwrap();
        assert_eq!(found.name, "BlackHole 16ch");
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_resolve_or_default_no_default() {
        let catalog = StaticCatalog::new().with_device("USB Mono Mic", 1, 0);
        let err = catalog
            .resolve_or_default(Some("x"), Direction::Playback, AudioFormat::STANDARD, None)
            .unwrap_err();
        assert!(matches!(err, RelayError::NoDefaultDevice { .. }));
    }

    #[test]
    fn test_device_config_default() {
        let config = DeviceConfig::default();
        assert_eq!(config.buffer_frames, 8);
        assert_eq!(config.buffer_samples(), 8 * 2048);
        assert!(config.poll_interval < AudioFormat::STANDARD.frame_duration());
    }
}
