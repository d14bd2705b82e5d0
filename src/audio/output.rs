// Audio output using cpal
// The activated playback session: owns the output stream on a dedicated
// holder thread (cpal streams are not Send) and feeds it from a ring buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::AudioError;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// How often the holder thread checks for shutdown.
const HOLDER_POLL: Duration = Duration::from_millis(50);

pub struct AudioOutput {
    producer: Mutex<RingProducer>,
    sample_rate: u32,
    channels: u16,
    volume: Arc<Mutex<f32>>,
    running: Arc<AtomicBool>,
    clear_flag: Arc<AtomicBool>,
    samples_played: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    holder: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Activate the output side: open the device (named, or the default),
    /// start the stream, and begin rendering from the ring buffer.
    ///
    /// The stream starts paused; `resume` makes it audible. `buffer_ms`
    /// sizes the ring buffer in milliseconds of audio at the device rate.
    pub fn activate(device_name: Option<String>, buffer_ms: u64) -> Result<Self, AudioError> {
        let volume = Arc::new(Mutex::new(1.0f32));
        let running = Arc::new(AtomicBool::new(false));
        let clear_flag = Arc::new(AtomicBool::new(false));
        let samples_played = Arc::new(AtomicU64::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let (setup_tx, setup_rx) = mpsc::channel();

        let thread_volume = volume.clone();
        let thread_running = running.clone();
        let thread_clear = clear_flag.clone();
        let thread_samples = samples_played.clone();
        let thread_shutdown = shutdown.clone();

        let holder = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let setup = Self::open_stream(
                    device_name,
                    buffer_ms,
                    thread_volume,
                    thread_running,
                    thread_clear,
                    thread_samples,
                );

                match setup {
                    Ok((stream, producer, sample_rate, channels)) => {
                        let _ = setup_tx.send(Ok((producer, sample_rate, channels)));
                        // Keep the stream alive until the session deactivates
                        while !thread_shutdown.load(Ordering::SeqCst) {
                            thread::sleep(HOLDER_POLL);
                        }
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = setup_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| AudioError::Session(format!("failed to spawn output thread: {}", e)))?;

        let (producer, sample_rate, channels) = setup_rx
            .recv()
            .map_err(|_| AudioError::Session("output thread exited during setup".to_string()))??;

        Ok(Self {
            producer: Mutex::new(producer),
            sample_rate,
            channels,
            volume,
            running,
            clear_flag,
            samples_played,
            shutdown,
            holder: Some(holder),
        })
    }

    /// Runs on the holder thread: device lookup, ring buffer, stream build.
    fn open_stream(
        device_name: Option<String>,
        buffer_ms: u64,
        volume: Arc<Mutex<f32>>,
        running: Arc<AtomicBool>,
        clear_flag: Arc<AtomicBool>,
        samples_played: Arc<AtomicU64>,
    ) -> Result<(Stream, RingProducer, u32, u16), AudioError> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(ref name) => host
                .output_devices()
                .map_err(|e| AudioError::Session(format!("failed to enumerate devices: {}", e)))?
                .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| AudioError::Session(format!("no output device named {}", name)))?,
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::Session("no output device available".to_string()))?,
        };

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Session(format!("failed to get output config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        // Ring buffer sized in milliseconds of interleaved audio
        let capacity =
            (sample_rate as u64 * channels as u64 * buffer_ms / 1000).max(1024) as usize;
        let rb = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = rb.split();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config.into(),
                consumer,
                volume,
                running,
                clear_flag,
                samples_played,
            )?,
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config.into(),
                consumer,
                volume,
                running,
                clear_flag,
                samples_played,
            )?,
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config.into(),
                consumer,
                volume,
                running,
                clear_flag,
                samples_played,
            )?,
            format => {
                return Err(AudioError::UnsupportedFormat(format!("{:?}", format)));
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::Session(format!("failed to start stream: {}", e)))?;

        Ok((stream, producer, sample_rate, channels))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
        volume: Arc<Mutex<f32>>,
        running: Arc<AtomicBool>,
        clear_flag: Arc<AtomicBool>,
        samples_played: Arc<AtomicU64>,
    ) -> Result<Stream, AudioError> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // If clear flag is set, drain the buffer before rendering
                    if clear_flag.swap(false, Ordering::SeqCst) {
                        while consumer.try_pop().is_some() {}
                    }

                    // Paused: render silence without consuming, so the
                    // played-sample count (and elapsed time) freezes
                    if !running.load(Ordering::SeqCst) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0);
                        }
                        return;
                    }

                    let vol = *volume.lock();
                    let mut popped = 0u64;
                    for sample in data.iter_mut() {
                        let value = match consumer.try_pop() {
                            Some(s) => {
                                popped += 1;
                                s * vol
                            }
                            None => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                    samples_played.fetch_add(popped, Ordering::Relaxed);
                },
                move |err| {
                    log::error!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Session(format!("failed to build output stream: {}", e)))?;

        Ok(stream)
    }

    /// Write samples to the output buffer.
    /// Returns the number of samples actually written.
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut producer = self.producer.lock();
        let mut written = 0;

        for &sample in samples {
            if producer.try_push(sample).is_ok() {
                written += 1;
            } else {
                // Buffer full, caller retries the rest
                break;
            }
        }

        written
    }

    /// Get available space in the buffer
    pub fn available_space(&self) -> usize {
        self.producer.lock().vacant_len()
    }

    /// True once everything written has been rendered or dropped
    pub fn is_drained(&self) -> bool {
        self.producer.lock().is_empty()
    }

    /// Clear the buffer (used when the loaded resource is replaced)
    pub fn clear(&self) {
        // The callback drains on its next run
        self.clear_flag.store(true, Ordering::SeqCst);
    }

    /// Halt rendering; buffered samples stay queued
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Resume rendering
    pub fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Playback position derived from samples actually rendered
    pub fn position(&self) -> Duration {
        let samples = self.samples_played.load(Ordering::Relaxed);
        let frames = samples / self.channels.max(1) as u64;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Rewind the position clock (used when the loaded resource is replaced)
    pub fn reset_position(&self) {
        self.samples_played.store(0, Ordering::SeqCst);
    }

    /// Get the output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of output channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        *self.volume.lock() = vol.clamp(0.0, 1.0);
    }

    /// Get the current volume
    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(holder) = self.holder.take() {
            let _ = holder.join();
        }
    }
}
