//! Builder that turns a [`RelayConfig`] into a ready [`Pipeline`].

use crate::device::{CpalCatalog, DeviceCatalog, DeviceConfig, DeviceDescriptor, Direction};
use crate::session::RelayCounters;
use crate::sink::{FrameSink, LocalPlayback, NetworkPlayback};
use crate::source::{FrameSource, LocalCapture, NetworkCapture, NoiseSource};
use crate::{EventCallback, LowPassFilter, Pipeline, RelayConfig, RelayEvent, RelayMode, RelayResult};

/// Resolves and opens both endpoints for a relay.
///
/// A capture device that cannot be resolved is fatal. A playback device that
/// cannot be resolved falls back to the host default with a
/// [`RelayEvent::DefaultDeviceSubstituted`].
///
/// The returned pipeline holds CPAL streams, which are not `Send` on every
/// platform. Build it on the thread that will run it.
///
/// # Example
///
/// ```ignore
/// use audio_relay::{CancelToken, RelayBuilder, RelayConfig, RelayMode};
///
/// let config = RelayConfig {
///     mode: RelayMode::UdpSend { target: "192.168.1.20:5005".parse()? },
///     ..Default::default()
/// };
///
/// let cancel = CancelToken::new();
/// let mut pipeline = RelayBuilder::new(config)
///     .on_event(|e| tracing::warn!(?e, "relay event"))
///     .build()?;
/// let stats = pipeline.run(&cancel)?;
/// ```
#[must_use]
pub struct RelayBuilder {
    config: RelayConfig,
    event_callback: Option<EventCallback>,
}

impl RelayBuilder {
    /// Creates a builder for `config`.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            event_callback: None,
        }
    }

    /// Set a callback for runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(RelayEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(crate::event_callback(callback));
        self
    }

    /// Validates the configuration, acquires both endpoints and assembles
    /// the pipeline.
    ///
    /// # Errors
    ///
    /// Returns any configuration, resolution, device or socket error. No
    /// endpoint stays open when this fails.
    pub fn build(self) -> RelayResult<Pipeline> {
        self.config.validate()?;

        let counters = RelayCounters::new();
        let events = counters.observe(self.event_callback.clone());
        let catalog = CpalCatalog::new();

        let filter = if self.config.filter_enabled {
            Some(LowPassFilter::new(self.config.cutoff_hz, self.config.format)?)
        } else {
            None
        };
        let source = self.open_source(&catalog, &events)?;
        let sink = self.open_sink(&catalog, &events)?;

        Ok(Pipeline::new(source, sink)
            .with_filter(filter)
            .with_counters(counters))
    }

    fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            format: self.config.format,
            buffer_frames: self.config.device_buffer_frames,
            idle_timeout: self.config.recv_timeout,
            ..DeviceConfig::default()
        }
    }

    fn open_source(
        &self,
        catalog: &CpalCatalog,
        events: &EventCallback,
    ) -> RelayResult<Box<dyn FrameSource>> {
        let format = self.config.format;
        Ok(match &self.config.mode {
            RelayMode::Local | RelayMode::UdpSend { .. } => {
                let descriptor =
                    catalog.resolve_required(&self.config.input_device, Direction::Capture, format)?;
                Box::new(LocalCapture::open(
                    catalog,
                    &descriptor,
                    self.device_config(),
                    Some(events.clone()),
                )?)
            }
            RelayMode::UdpReceive { bind } => Box::new(
                NetworkCapture::bind(*bind, format, self.config.recv_timeout)?
                    .with_events(Some(events.clone())),
            ),
            RelayMode::Noise { .. } => Box::new(NoiseSource::new(format)),
        })
    }

    fn open_sink(
        &self,
        catalog: &CpalCatalog,
        events: &EventCallback,
    ) -> RelayResult<Box<dyn FrameSink>> {
        let format = self.config.format;
        match &self.config.mode {
            RelayMode::UdpSend { target }
            | RelayMode::Noise {
                target: Some(target),
            } => Ok(Box::new(NetworkPlayback::connect(*target, format)?)),
            RelayMode::Local | RelayMode::UdpReceive { .. } | RelayMode::Noise { target: None } => {
                let descriptor = resolve_output(catalog, &self.config, events)?;
                Ok(Box::new(LocalPlayback::open(
                    catalog,
                    &descriptor,
                    self.device_config(),
                    Some(events.clone()),
                )?))
            }
        }
    }
}

/// Picks the playback device, honoring `output_fallback`.
fn resolve_output<C: DeviceCatalog>(
    catalog: &C,
    config: &RelayConfig,
    events: &EventCallback,
) -> RelayResult<DeviceDescriptor> {
    match config.output_device.as_deref() {
        Some(query) if !config.output_fallback => {
            catalog.resolve_required(query, Direction::Playback, config.format)
        }
        query => catalog.resolve_or_default(query, Direction::Playback, config.format, Some(events)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CancelToken, PipelineState, RelayError, StaticCatalog};
    use std::net::UdpSocket;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn speakers_only() -> StaticCatalog {
        StaticCatalog::new()
            .with_device("BlackHole 16ch", 16, 16)
            .with_device("MacBook Pro Speakers", 0, 2)
            .with_default(Direction::Playback, 1)
    }

    fn output_config(output: &str, fallback: bool) -> RelayConfig {
        RelayConfig {
            output_device: Some(output.to_string()),
            output_fallback: fallback,
            ..Default::default()
        }
    }

    #[test]
    fn test_unmatched_output_falls_back_when_allowed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let events = crate::event_callback(move |e| seen_clone.lock().unwrap().push(e));

        let config = output_config("Studio Monitors", true);
        let found = resolve_output(&speakers_only(), &config, &events).unwrap();

        assert_eq!(found.name, "MacBook Pro Speakers");
        assert!(matches!(
            seen.lock().unwrap().as_slice(),
            [RelayEvent::DefaultDeviceSubstituted { .. }]
        ));
    }

    #[test]
    fn test_unmatched_output_fatal_without_fallback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let events = crate::event_callback(move |e| seen_clone.lock().unwrap().push(e));

        let config = output_config("Studio Monitors", false);
        let err = resolve_output(&speakers_only(), &config, &events).unwrap_err();

        assert!(matches!(
            err,
            RelayError::DeviceNotFound {
                direction: Direction::Playback,
                ..
            }
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_matched_output_without_fallback() {
        let events = crate::event_callback(|_| {});
        let config = output_config("blackhole", false);
        let found = resolve_output(&speakers_only(), &config, &events).unwrap();
        assert_eq!(found.name, "BlackHole 16ch");
        assert_eq!(found.direction, Direction::Playback);
    }

    #[test]
    fn test_no_output_query_uses_default_even_without_fallback() {
        let events = crate::event_callback(|_| {});
        let config = RelayConfig {
            output_fallback: false,
            ..Default::default()
        };
        let found = resolve_output(&speakers_only(), &config, &events).unwrap();
        assert_eq!(found.name, "MacBook Pro Speakers");
    }

    #[test]
    fn test_build_rejects_invalid_cutoff() {
        let config = RelayConfig {
            cutoff_hz: -10.0,
            ..Default::default()
        };
        let result = RelayBuilder::new(config).build();
        assert!(matches!(result, Err(RelayError::InvalidCutoff { .. })));
    }

    #[test]
    fn test_noise_to_udp_needs_no_devices() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let config = RelayConfig {
            mode: RelayMode::Noise {
                target: Some(receiver.local_addr().unwrap()),
            },
            ..Default::default()
        };

        let mut pipeline = RelayBuilder::new(config).build().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Created);
        assert!(pipeline.filter().is_some());

        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 8192];
            let (size, _) = receiver.recv_from(&mut buf).unwrap();
            canceller.cancel();
            size
        });

        let stats = pipeline.run(&cancel).unwrap();
        assert_eq!(handle.join().unwrap(), 4096);
        assert!(stats.frames_relayed >= 1);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
}
