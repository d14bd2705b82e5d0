// Engine playback controller
// The low-level path: Symphonia decoder feeding a cpal output through a
// ring buffer, with a feeder thread that pushes samples and fires the
// periodic timing callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::controls::{
    report, AudioPlaying, CompletionCallback, ElapsedCallback, PlaybackOutcome, PlayerCallbacks,
    ProgressCallback, ReadyCallback, StoppedCallback, TotalLengthCallback,
};
use crate::audio::decoder::AudioDecoder;
use crate::audio::output::AudioOutput;
use crate::audio::resource::Resource;
use crate::audio::session::PlaybackSession;
use crate::error::AudioError;
use crate::settings::PlayerSettings;
use crate::timefmt::clock_format;

/// Sleep while paused or while the ring buffer is full.
const FEED_IDLE: Duration = Duration::from_millis(10);

pub struct EnginePlayer {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    output: Mutex<Option<AudioOutput>>,
    session: Mutex<Option<PlaybackSession>>,
    callbacks: PlayerCallbacks,
    playing: AtomicBool,
    // Set on drop so an in-flight attach cannot start a feeder that
    // outlives the player
    defunct: AtomicBool,
    volume: Mutex<f32>,
    feed_stop: Mutex<Option<Arc<AtomicBool>>>,
    feeder: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    buffer_ms: u64,
    device: Option<String>,
}

impl EnginePlayer {
    pub fn new() -> Self {
        Self::with_settings(&PlayerSettings::default())
    }

    pub fn with_settings(settings: &PlayerSettings) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                output: Mutex::new(None),
                session: Mutex::new(None),
                callbacks: PlayerCallbacks::default(),
                playing: AtomicBool::new(false),
                defunct: AtomicBool::new(false),
                volume: Mutex::new(settings.volume.clamp(0.0, 1.0)),
                feed_stop: Mutex::new(None),
                feeder: Mutex::new(None),
                tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
                buffer_ms: settings.buffer_ms,
                device: settings.device.clone(),
            }),
        }
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        let vol = vol.clamp(0.0, 1.0);
        *self.inner.volume.lock().unwrap() = vol;
        if let Some(ref output) = *self.inner.output.lock().unwrap() {
            output.set_volume(vol);
        }
    }

    pub fn volume(&self) -> f32 {
        *self.inner.volume.lock().unwrap()
    }

    /// Release the loaded resource; the controller stays usable.
    pub fn stop(&self) {
        self.inner.stop_feeder();
        self.inner.playing.store(false, Ordering::SeqCst);
        if let Some(ref output) = *self.inner.output.lock().unwrap() {
            output.pause();
            output.clear();
            output.reset_position();
        }
        *self.inner.session.lock().unwrap() = None;
    }

    /// Snapshot of the current playback session, if a resource is loaded.
    pub fn session(&self) -> Option<PlaybackSession> {
        self.inner.session.lock().unwrap().clone()
    }
}

impl Default for EnginePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlaying for EnginePlayer {
    fn set_on_elapsed(&self, callback: ElapsedCallback) {
        self.inner.callbacks.set_elapsed(callback);
    }

    fn set_on_total_length(&self, callback: TotalLengthCallback) {
        self.inner.callbacks.set_total_length(callback);
    }

    fn set_on_progress(&self, callback: ProgressCallback) {
        self.inner.callbacks.set_progress(callback);
    }

    fn set_on_ready(&self, callback: ReadyCallback) {
        self.inner.callbacks.set_ready(callback);
    }

    fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::SeqCst)
    }

    fn configure(&self, resource: &Resource, completion: Option<CompletionCallback>) {
        self.inner.clone().attach(resource.clone(), completion, None);
    }

    fn play(&self) {
        if let Some(ref output) = *self.inner.output.lock().unwrap() {
            output.resume();
        }
        self.inner.playing.store(true, Ordering::SeqCst);

        // Compute under the lock, fire outside it
        let total = {
            let mut session = self.inner.session.lock().unwrap();
            match *session {
                Some(ref mut session) => {
                    session.set_playing(true);
                    Some(session.duration_seconds())
                }
                None => None,
            }
        };
        if let Some(total) = total {
            self.inner.callbacks.fire_total_length(clock_format(total));
        }
    }

    fn pause(&self) {
        if let Some(ref output) = *self.inner.output.lock().unwrap() {
            output.pause();
        }
        self.inner.playing.store(false, Ordering::SeqCst);
        if let Some(ref mut session) = *self.inner.session.lock().unwrap() {
            session.set_playing(false);
        }
    }

    fn prepare(
        &self,
        resource: &Resource,
        completion: Option<CompletionCallback>,
        stopped: Option<StoppedCallback>,
    ) {
        self.inner.clone().attach(resource.clone(), completion, stopped);
    }
}

impl Drop for EnginePlayer {
    fn drop(&mut self) {
        self.inner.defunct.store(true, Ordering::SeqCst);
        self.inner.stop_feeder();
        // AudioOutput::drop deactivates the session once the feeder is gone
    }
}

impl EngineInner {
    /// Dispatch activation + load onto a background thread and report the
    /// outcome through the completion callback.
    fn attach(
        self: Arc<Self>,
        resource: Resource,
        completion: Option<CompletionCallback>,
        stopped: Option<StoppedCallback>,
    ) {
        thread::spawn(move || {
            let outcome = self
                .ensure_activated()
                .and_then(|_| self.clone().load(resource, stopped));
            match outcome {
                Ok(()) => report(completion, PlaybackOutcome::Success),
                Err(e) => {
                    log::warn!("engine attach failed: {}", e);
                    report(completion, PlaybackOutcome::Failure);
                }
            }
        });
    }

    /// Open the output device if it is not already open.
    fn ensure_activated(&self) -> Result<(), AudioError> {
        let mut output = self.output.lock().unwrap();
        if output.is_none() {
            let activated = AudioOutput::activate(self.device.clone(), self.buffer_ms)?;
            activated.set_volume(*self.volume.lock().unwrap());
            *output = Some(activated);
        }
        Ok(())
    }

    /// Tear down the current feeder thread, if any.
    fn stop_feeder(&self) {
        if let Some(stop) = self.feed_stop.lock().unwrap().take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.feeder.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Open a decoder for the resource and hand it to a fresh feeder thread.
    fn load(
        self: Arc<Self>,
        resource: Resource,
        stopped: Option<StoppedCallback>,
    ) -> Result<(), AudioError> {
        if self.defunct.load(Ordering::SeqCst) {
            return Err(AudioError::Session("player released".to_string()));
        }

        let path = resource
            .to_path()
            .ok_or_else(|| AudioError::Unplayable(format!("not a local resource: {}", resource)))?;
        let decoder = AudioDecoder::open(&path)?;

        self.stop_feeder();
        self.playing.store(false, Ordering::SeqCst);

        {
            let output = self.output.lock().unwrap();
            let output = output
                .as_ref()
                .ok_or_else(|| AudioError::Session("output not activated".to_string()))?;
            output.pause();
            output.clear();
            output.reset_position();
            if decoder.sample_rate() != output.sample_rate() {
                // No resampling in this path; pitch follows the device rate
                log::warn!(
                    "sample rate mismatch: track {} Hz, device {} Hz",
                    decoder.sample_rate(),
                    output.sample_rate()
                );
            }
        }

        let mut session = PlaybackSession::new(resource);
        if let Some(duration) = decoder.duration() {
            session.set_duration(duration);
        }
        *self.session.lock().unwrap() = Some(session);

        let stop = Arc::new(AtomicBool::new(false));
        *self.feed_stop.lock().unwrap() = Some(stop.clone());

        let worker = FeedWorker {
            decoder,
            inner: self.clone(),
            stop,
            stopped,
        };
        let handle = thread::Builder::new()
            .name("engine-feeder".to_string())
            .spawn(move || worker.run())
            .map_err(|e| AudioError::Session(format!("failed to spawn feeder: {}", e)))?;
        *self.feeder.lock().unwrap() = Some(handle);

        self.callbacks.fire_ready();
        Ok(())
    }
}

/// Decode-and-push worker owned by the feeder thread.
struct FeedWorker {
    decoder: AudioDecoder,
    inner: Arc<EngineInner>,
    stop: Arc<AtomicBool>,
    stopped: Option<StoppedCallback>,
}

impl FeedWorker {
    fn run(mut self) {
        let src_channels = self.decoder.channels();
        let mut pending: Vec<f32> = Vec::new();
        let mut eof = false;
        let mut last_tick: Option<Duration> = None;

        loop {
            if self.stop.load(Ordering::SeqCst) || self.inner.defunct.load(Ordering::SeqCst) {
                return;
            }

            if !self.inner.playing.load(Ordering::SeqCst) {
                thread::sleep(FEED_IDLE);
                continue;
            }

            let (position, dst_channels, space, drained) = {
                let output = self.inner.output.lock().unwrap();
                match output.as_ref() {
                    Some(o) => (
                        o.position(),
                        o.channels() as usize,
                        o.available_space(),
                        o.is_drained(),
                    ),
                    None => return,
                }
            };

            self.tick(position, &mut last_tick);

            if eof {
                if drained {
                    break;
                }
                thread::sleep(FEED_IDLE);
                continue;
            }

            if pending.is_empty() {
                match self.decoder.decode_next() {
                    Ok(Some(samples)) => {
                        pending = adapt_channels(&samples, src_channels, dst_channels);
                    }
                    Ok(None) => {
                        eof = true;
                        continue;
                    }
                    Err(e) => {
                        log::error!("decode failed, ending playback: {}", e);
                        eof = true;
                        continue;
                    }
                }
            }

            if space == 0 {
                thread::sleep(FEED_IDLE);
                continue;
            }

            let written = {
                let output = self.inner.output.lock().unwrap();
                match output.as_ref() {
                    Some(o) => o.write(&pending),
                    None => return,
                }
            };
            pending.drain(..written);
        }

        // Natural end of playback
        self.inner.playing.store(false, Ordering::SeqCst);
        if let Some(ref output) = *self.inner.output.lock().unwrap() {
            output.pause();
        }
        if let Some(ref mut session) = *self.inner.session.lock().unwrap() {
            session.set_playing(false);
        }
        if let Some(ref stopped) = self.stopped {
            stopped();
        }
    }

    /// Fire elapsed/progress each time the rendered position crosses a
    /// tick boundary. Only runs while playing.
    fn tick(&self, position: Duration, last_tick: &mut Option<Duration>) {
        let due = match *last_tick {
            Some(last) => position >= last + self.inner.tick_interval,
            None => true,
        };
        if !due {
            return;
        }
        *last_tick = Some(position);

        let (elapsed, total) = {
            let mut session = self.inner.session.lock().unwrap();
            match *session {
                Some(ref mut session) => {
                    let elapsed = session.observe_elapsed(position);
                    (elapsed.as_secs_f64(), session.duration_seconds())
                }
                None => return,
            }
        };

        self.inner.callbacks.fire_elapsed(clock_format(elapsed));
        self.inner.callbacks.fire_progress(elapsed, total);
    }
}

/// Map interleaved samples between channel counts: passthrough when equal,
/// duplicate the last source channel upward, average the extras downward.
fn adapt_channels(samples: &[f32], src: usize, dst: usize) -> Vec<f32> {
    if src == dst || src == 0 || dst == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / src;
    let mut out = Vec::with_capacity(frames * dst);

    for frame in samples.chunks_exact(src) {
        if dst > src {
            for ch in 0..dst {
                out.push(frame[ch.min(src - 1)]);
            }
        } else {
            // Fold the trailing source channels into the last output slot
            for ch in 0..dst - 1 {
                out.push(frame[ch]);
            }
            let rest = &frame[dst - 1..];
            out.push(rest.iter().sum::<f32>() / rest.len() as f32);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_fresh_player_state() {
        let player = EnginePlayer::new();
        assert!(!player.is_playing());
        assert!(player.session().is_none());
        assert_eq!(player.volume(), 1.0);
    }

    #[test]
    fn test_prepare_invalid_resource_reports_failure() {
        let player = EnginePlayer::new();
        let (tx, rx) = mpsc::channel();
        player.prepare(
            &Resource::new("/nonexistent/audio.flac"),
            Some(Box::new(move |outcome| {
                let _ = tx.send(outcome);
            })),
            None,
        );
        // Fails at activation on headless machines, at decode otherwise
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Failure);
    }

    #[test]
    fn test_play_then_pause_clears_playing() {
        let player = EnginePlayer::new();
        player.play();
        player.pause();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_volume_is_clamped() {
        let player = EnginePlayer::new();
        player.set_volume(2.5);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(-1.0);
        assert_eq!(player.volume(), 0.0);
    }

    #[test]
    fn test_adapt_channels_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(adapt_channels(&samples, 2, 2), samples);
    }

    #[test]
    fn test_adapt_mono_to_stereo() {
        let samples = vec![0.5, -0.5];
        assert_eq!(adapt_channels(&samples, 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_adapt_stereo_to_mono() {
        let samples = vec![0.2, 0.4, -1.0, 1.0];
        let out = adapt_channels(&samples, 2, 1);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
    }
}
