//! CPAL playback device wrapped as a frame sink.

use std::sync::Arc;
use std::time::Instant;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::device::{
    open_stream_config, CpalCatalog, DeviceConfig, Direction, StreamHealth, StreamSetup,
};
use crate::event::{emit, EventCallback, RelayEvent};
use crate::format::i16_to_f32;
use crate::sink::{check_frame_format, FrameSink};
use crate::{AudioFrame, DeviceDescriptor, RelayError, RelayResult};

/// A running playback stream on a local output device.
///
/// Frames are queued in a ring buffer drained by the CPAL callback.
/// [`put`](FrameSink::put) blocks while the queue is full. When the callback
/// finds the queue empty after playback has begun, it plays silence and a
/// [`RelayEvent::PlaybackUnderrun`] is emitted on the next `put`.
///
/// Playback stops when this value is dropped.
pub struct LocalPlayback {
    name: String,
    // Dropping the stream stops CPAL.
    _stream: Stream,
    producer: HeapProd<i16>,
    health: Arc<StreamHealth>,
    config: DeviceConfig,
    events: Option<EventCallback>,
}

impl LocalPlayback {
    /// Opens the device behind `descriptor` and starts the output stream.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device cannot be opened or started,
    /// and `UnsupportedFormat` if it cannot play the configured format.
    pub fn open(
        catalog: &CpalCatalog,
        descriptor: &DeviceDescriptor,
        config: DeviceConfig,
        events: Option<EventCallback>,
    ) -> RelayResult<Self> {
        let device = catalog.open(descriptor)?;
        let setup = open_stream_config(&device, Direction::Playback, config.format)?;

        let ring_buffer = HeapRb::<i16>::new(config.buffer_samples());
        let (producer, consumer) = ring_buffer.split();
        let health = Arc::new(StreamHealth::default());

        let stream = match setup.sample_format {
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &setup,
                &config,
                consumer,
                &health,
                &descriptor.name,
                |s| s,
            )?,
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &setup,
                &config,
                consumer,
                &health,
                &descriptor.name,
                i16_to_f32,
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
            "playback started"
        );

        Ok(Self {
            name: descriptor.name.clone(),
            _stream: stream,
            producer,
            health,
            config,
            events,
        })
    }

    fn check_health(&self) -> RelayResult<()> {
        let missing_samples = self.health.take_xrun();
        if missing_samples > 0 {
            emit(
                self.events.as_ref(),
                RelayEvent::PlaybackUnderrun { missing_samples },
            );
        }
        if self.health.is_lost() {
            return Err(RelayError::unavailable(&self.name, "device disconnected"));
        }
        Ok(())
    }
}

impl FrameSink for LocalPlayback {
    fn name(&self) -> &str {
        &self.name
    }

    fn put(&mut self, frame: &AudioFrame) -> RelayResult<()> {
        // A frame larger than the queue would never fit.
        check_frame_format(self.config.format, frame)?;
        let samples = frame.samples();
        loop {
            self.check_health()?;
            if self.producer.vacant_len() >= samples.len() {
                self.producer.push_slice(samples);
                return Ok(());
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Lets queued audio play out, bounded by the queue's own duration.
    fn finish(&mut self) -> RelayResult<()> {
        let limit = self.config.format.frame_duration() * (self.config.buffer_frames as u32 + 1);
        let started = Instant::now();
        while self.producer.occupied_len() > 0 && started.elapsed() < limit {
            self.check_health()?;
            std::thread::sleep(self.config.poll_interval);
        }
        Ok(())
    }
}

impl Drop for LocalPlayback {
    fn drop(&mut self) {
        tracing::info!(device = %self.name, "playback stopped");
    }
}

fn build_stream<T: SizedSample + 'static>(
    device: &cpal::Device,
    setup: &StreamSetup,
    config: &DeviceConfig,
    mut consumer: HeapCons<i16>,
    health: &Arc<StreamHealth>,
    name: &str,
    convert: fn(i16) -> T,
) -> RelayResult<Stream> {
    let device_channels = setup.device_channels as usize;
    let channels = config.format.channels as usize;
    let callback_health = Arc::clone(health);
    let mut primed = false;

    device
        .build_output_stream(
            &setup.config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let missing = pop_sample_frames(
                    &mut consumer,
                    data,
                    device_channels,
                    channels,
                    convert,
                    &mut primed,
                );
                callback_health.add_xrun(missing);
            },
            health.error_callback(name),
            None,
        )
        .map_err(|e| RelayError::unavailable(name, e))
}

/// Fills the first `channels` slots of every device sample-frame from the
/// queue and silences the rest.
///
/// Silence played before the first queued sample is not an underrun.
/// Returns the number of relay samples that had to be filled with silence.
fn pop_sample_frames<T: Sample>(
    consumer: &mut HeapCons<i16>,
    data: &mut [T],
    device_channels: usize,
    channels: usize,
    convert: fn(i16) -> T,
    primed: &mut bool,
) -> usize {
    let mut missing = 0;
    for sample_frame in data.chunks_exact_mut(device_channels) {
        let (relay, extra) = sample_frame.split_at_mut(channels);
        if consumer.occupied_len() >= channels {
            *primed = true;
            for slot in relay {
                *slot = convert(consumer.try_pop().unwrap_or(0));
            }
        } else {
            if *primed {
                missing += channels;
            }
            relay.fill(T::EQUILIBRIUM);
        }
        extra.fill(T::EQUILIBRIUM);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_fills_leading_channels_and_zeroes_rest() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(8).split();
        producer.push_slice(&[1, 2, 3, 4]);

        let mut data = [9i16; 8];
        let mut primed = false;
        let missing = pop_sample_frames(&mut consumer, &mut data, 4, 2, |s| s, &mut primed);

        assert_eq!(missing, 0);
        assert!(primed);
        assert_eq!(data, [1, 2, 0, 0, 3, 4, 0, 0]);
    }

    #[test]
    fn test_silence_before_first_frame_is_not_underrun() {
        let (_producer, mut consumer) = HeapRb::<i16>::new(8).split();
        let mut data = [5i16; 4];
        let mut primed = false;

        let missing = pop_sample_frames(&mut consumer, &mut data, 2, 2, |s| s, &mut primed);
        assert_eq!(missing, 0);
        assert_eq!(data, [0; 4]);
    }

    #[test]
    fn test_underrun_after_priming() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(8).split();
        producer.push_slice(&[7, 8]);

        let mut data = [0f32; 6];
        let mut primed = false;
        let missing = pop_sample_frames(&mut consumer, &mut data, 2, 2, i16_to_f32, &mut primed);

        assert_eq!(missing, 4);
        assert!(data[0] > 0.0);
        assert_eq!(&data[2..], &[0.0; 4]);
    }

    // Requires actual audio hardware; skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_play_silence_on_default_output() {
        use crate::{AudioFormat, DeviceCatalog};

        let catalog = CpalCatalog::new();
        let descriptor = catalog.default_device(Direction::Playback).unwrap().unwrap();
        let mut playback =
            LocalPlayback::open(&catalog, &descriptor, DeviceConfig::default(), None).unwrap();
        for _ in 0..10 {
            playback.put(&AudioFrame::silence(AudioFormat::STANDARD)).unwrap();
        }
        playback.finish().unwrap();
    }
}
