//! CPAL capture device wrapped as a frame source.

use std::sync::Arc;
use std::time::Instant;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, Stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::FrameSource;
use crate::device::{
    open_stream_config, CpalCatalog, DeviceConfig, Direction, StreamHealth, StreamSetup,
};
use crate::event::{emit, EventCallback, RelayEvent};
use crate::format::f32_to_i16;
use crate::{AudioFrame, DeviceDescriptor, RelayError, RelayResult};

/// A running capture stream on a local input device.
///
/// The CPAL callback pushes samples into a lock-free ring buffer and
/// [`next`](FrameSource::next) pulls whole frames out of it. If the relay
/// falls behind and the ring fills, the callback drops the excess and a
/// [`RelayEvent::CaptureOverflow`] is emitted on the next read.
///
/// Capture stops when this value is dropped.
pub struct LocalCapture {
    name: String,
    // Dropping the stream stops CPAL.
    _stream: Stream,
    consumer: HeapCons<i16>,
    health: Arc<StreamHealth>,
    config: DeviceConfig,
    events: Option<EventCallback>,
}

impl LocalCapture {
    /// Opens the device behind `descriptor` and starts capturing.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device cannot be opened or started,
    /// and `UnsupportedFormat` if it cannot deliver the configured format.
    pub fn open(
        catalog: &CpalCatalog,
        descriptor: &DeviceDescriptor,
        config: DeviceConfig,
        events: Option<EventCallback>,
    ) -> RelayResult<Self> {
        let device = catalog.open(descriptor)?;
        let setup = open_stream_config(&device, Direction::Capture, config.format)?;

        let ring_buffer = HeapRb::<i16>::new(config.buffer_samples());
        let (producer, consumer) = ring_buffer.split();
        let health = Arc::new(StreamHealth::default());

        let stream = match setup.sample_format {
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &setup,
                &config,
                producer,
                &health,
                &descriptor.name,
                |s| s,
            )?,
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &setup,
                &config,
                producer,
                &health,
                &descriptor.name,
                f32_to_i16,
            )?,
            format => {
                return Err(RelayError::UnsupportedFormat {
                    format: format!("{format:?}"),
                });
            }
        };

        stream
            .play()
            .map_err(|e| RelayError::unavailable(&descriptor.name, e))?;

        tracing::info!(
            device = %descriptor.name,
            device_channels = setup.device_channels,
            "capture started"
        );

        Ok(Self {
            name: descriptor.name.clone(),
            _stream: stream,
            consumer,
            health,
            config,
            events,
        })
    }

    fn report_overflow(&self) {
        let dropped_samples = self.health.take_xrun();
        if dropped_samples > 0 {
            emit(
                self.events.as_ref(),
                RelayEvent::CaptureOverflow { dropped_samples },
            );
        }
    }
}

impl FrameSource for LocalCapture {
    fn name(&self) -> &str {
        &self.name
    }

    fn next(&mut self) -> RelayResult<Option<AudioFrame>> {
        let needed = self.config.format.samples_per_frame();
        let started = Instant::now();

        loop {
            self.report_overflow();
            if self.health.is_lost() {
                return Err(RelayError::unavailable(&self.name, "device disconnected"));
            }

            if self.consumer.occupied_len() >= needed {
                let mut samples = vec![0i16; needed];
                self.consumer.pop_slice(&mut samples);
                return AudioFrame::new(samples, self.config.format).map(Some);
            }

            if started.elapsed() >= self.config.idle_timeout {
                return Ok(None);
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }
}

impl Drop for LocalCapture {
    fn drop(&mut self) {
        tracing::info!(device = %self.name, "capture stopped");
    }
}

fn build_stream<T: SizedSample + 'static>(
    device: &cpal::Device,
    setup: &StreamSetup,
    config: &DeviceConfig,
    mut producer: HeapProd<i16>,
    health: &Arc<StreamHealth>,
    name: &str,
    convert: fn(T) -> i16,
) -> RelayResult<Stream> {
    let device_channels = setup.device_channels as usize;
    let channels = config.format.channels as usize;
    let callback_health = Arc::clone(health);

    device
        .build_input_stream(
            &setup.config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Non-blocking push - drops samples if buffer is full
                let dropped =
                    push_sample_frames(&mut producer, data, device_channels, channels, convert);
                callback_health.add_xrun(dropped);
            },
            health.error_callback(name),
            None,
        )
        .map_err(|e| RelayError::unavailable(name, e))
}

/// Pushes the first `channels` samples of every device sample-frame.
///
/// Only whole sample-frames enter the ring so the interleaving never slips.
/// Returns the number of relay samples dropped for lack of room.
fn push_sample_frames<T: Copy>(
    producer: &mut HeapProd<i16>,
    data: &[T],
    device_channels: usize,
    channels: usize,
    convert: fn(T) -> i16,
) -> usize {
    let mut dropped = 0;
    for sample_frame in data.chunks_exact(device_channels) {
        if producer.vacant_len() < channels {
            dropped += channels;
            continue;
        }
        for &sample in &sample_frame[..channels] {
            let _ = producer.try_push(convert(sample));
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_leading_channels() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(16).split();
        // Four-channel device, relay keeps two.
        let data = [1i16, 2, 90, 91, 3, 4, 92, 93];
        let dropped = push_sample_frames(&mut producer, &data, 4, 2, |s| s);

        assert_eq!(dropped, 0);
        let mut out = [0i16; 4];
        assert_eq!(consumer.pop_slice(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_push_counts_overflow_in_whole_sample_frames() {
        let (mut producer, consumer) = HeapRb::<i16>::new(5).split();
        let data = [1i16, 2, 3, 4, 5, 6, 7, 8];
        let dropped = push_sample_frames(&mut producer, &data, 2, 2, |s| s);

        // Room for two stereo pairs; the odd slot stays empty.
        assert_eq!(consumer.occupied_len(), 4);
        assert_eq!(dropped, 4);
    }

    #[test]
    fn test_push_converts_f32() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(4).split();
        push_sample_frames(&mut producer, &[1.0f32, -1.0], 2, 2, f32_to_i16);
        assert_eq!(consumer.try_pop(), Some(32767));
        assert_eq!(consumer.try_pop(), Some(-32767));
    }

    // Requires actual audio hardware; skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_capture_default_input() {
        use crate::DeviceCatalog;

        let catalog = CpalCatalog::new();
        let descriptor = catalog.default_device(Direction::Capture).unwrap().unwrap();
        let mut capture =
            LocalCapture::open(&catalog, &descriptor, DeviceConfig::default(), None).unwrap();
        let frame = capture.next().unwrap();
        println!("Captured from {}: {:?}", capture.name(), frame.map(|f| f.frame_count()));
    }
}
