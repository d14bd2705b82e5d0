// Sink playback controller
// The high-level path: rodio owns buffering, decoding and timing; a
// watcher thread keeps the output stream alive, polls the position and
// reports end-of-playback.

use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::audio::controls::{
    report, AudioPlaying, CompletionCallback, ElapsedCallback, PlaybackOutcome, PlayerCallbacks,
    ProgressCallback, ReadyCallback, StoppedCallback, TotalLengthCallback,
};
use crate::audio::resource::Resource;
use crate::audio::session::PlaybackSession;
use crate::metadata;
use crate::settings::PlayerSettings;
use crate::timefmt::clock_format;

pub struct SinkPlayer {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    sink: Mutex<Option<Arc<Sink>>>,
    session: Mutex<Option<PlaybackSession>>,
    callbacks: PlayerCallbacks,
    // Arc so end-of-playback can invoke it outside the lock; the callback
    // may well call prepare() to line up the next track
    stopped_cb: Mutex<Option<Arc<StoppedCallback>>>,
    volume: Mutex<f32>,
    // true while the sink holds a loaded item whose end we have not reported
    item_loaded: AtomicBool,
    watch_stop: Mutex<Option<Arc<AtomicBool>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

impl SinkPlayer {
    pub fn new() -> Self {
        Self::with_settings(&PlayerSettings::default())
    }

    pub fn with_settings(settings: &PlayerSettings) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                sink: Mutex::new(None),
                session: Mutex::new(None),
                callbacks: PlayerCallbacks::default(),
                stopped_cb: Mutex::new(None),
                volume: Mutex::new(settings.volume.clamp(0.0, 1.0)),
                item_loaded: AtomicBool::new(false),
                watch_stop: Mutex::new(None),
                watcher: Mutex::new(None),
                tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
            }),
        }
    }

    /// Set the output volume (0.0 to 1.0)
    pub fn set_volume(&self, vol: f32) {
        let vol = vol.clamp(0.0, 1.0);
        *self.inner.volume.lock().unwrap() = vol;
        if let Some(ref sink) = *self.inner.sink.lock().unwrap() {
            sink.set_volume(vol);
        }
    }

    pub fn volume(&self) -> f32 {
        *self.inner.volume.lock().unwrap()
    }

    /// Release the loaded resource; the controller stays usable.
    pub fn stop(&self) {
        self.inner.item_loaded.store(false, Ordering::SeqCst);
        if let Some(ref sink) = *self.inner.sink.lock().unwrap() {
            sink.clear();
        }
        *self.inner.session.lock().unwrap() = None;
    }

    /// Snapshot of the current playback session, if a resource is loaded.
    pub fn session(&self) -> Option<PlaybackSession> {
        self.inner.session.lock().unwrap().clone()
    }
}

impl Default for SinkPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlaying for SinkPlayer {
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
        self.inner
            .sink
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| !s.is_paused() && !s.empty())
            .unwrap_or(false)
    }

    fn configure(&self, resource: &Resource, completion: Option<CompletionCallback>) {
        self.inner.clone().attach(resource.clone(), completion);
    }

    fn play(&self) {
        if let Some(ref sink) = *self.inner.sink.lock().unwrap() {
            sink.play();
        }
        if let Some(ref mut session) = *self.inner.session.lock().unwrap() {
            session.set_playing(true);
        }
    }

    fn pause(&self) {
        if let Some(ref sink) = *self.inner.sink.lock().unwrap() {
            sink.pause();
        }
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
        *self.inner.stopped_cb.lock().unwrap() = stopped.map(Arc::new);
        self.inner.clone().attach(resource.clone(), completion);
    }
}

impl Drop for SinkPlayer {
    fn drop(&mut self) {
        self.inner.deactivate();
    }
}

impl SinkInner {
    /// Ensure the output side is up, load the resource, report the outcome.
    /// Never blocks the caller.
    fn attach(self: Arc<Self>, resource: Resource, completion: Option<CompletionCallback>) {
        let activated = self.sink.lock().unwrap().is_some();
        if activated {
            thread::spawn(move || {
                let outcome = self.load(&resource);
                self.finish_attach(outcome, completion);
            });
        } else {
            self.spawn_watcher(resource, completion);
        }
    }

    /// Bring up the output stream and sink on a dedicated thread, then keep
    /// polling there. The rodio output stream is not Send, so the thread
    /// that creates it owns it for the whole session.
    fn spawn_watcher(self: Arc<Self>, resource: Resource, completion: Option<CompletionCallback>) {
        let stop = Arc::new(AtomicBool::new(false));
        *self.watch_stop.lock().unwrap() = Some(stop.clone());

        let inner = self.clone();
        let spawned = thread::Builder::new()
            .name("sink-watcher".to_string())
            .spawn(move || {
                // Session activation
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("failed to open output stream: {}", e);
                        report(completion, PlaybackOutcome::Failure);
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        log::warn!("failed to create sink: {}", e);
                        report(completion, PlaybackOutcome::Failure);
                        return;
                    }
                };
                sink.pause();
                sink.set_volume(*inner.volume.lock().unwrap());
                *inner.sink.lock().unwrap() = Some(Arc::new(sink));

                let outcome = inner.load(&resource);
                inner.finish_attach(outcome, completion);

                // Periodic observation until the session deactivates;
                // _stream drops with this thread
                while !stop.load(Ordering::SeqCst) {
                    inner.observe();
                    thread::sleep(inner.tick_interval);
                }
            });

        match spawned {
            Ok(handle) => *self.watcher.lock().unwrap() = Some(handle),
            Err(e) => log::error!("failed to spawn watcher thread: {}", e),
        }
    }

    fn finish_attach(&self, outcome: Result<()>, completion: Option<CompletionCallback>) {
        match outcome {
            Ok(()) => report(completion, PlaybackOutcome::Success),
            Err(e) => {
                log::warn!("sink attach failed: {:#}", e);
                report(completion, PlaybackOutcome::Failure);
            }
        }
    }

    /// Validate the resource and hand it to the sink, replacing any
    /// current item. The sink stays paused until play().
    fn load(&self, resource: &Resource) -> Result<()> {
        let path = resource
            .to_path()
            .with_context(|| format!("not a local resource: {}", resource))?;

        // The playability check: unreadable media never reaches the sink
        let info = metadata::probe(&path)?;

        let file = File::open(&path)
            .with_context(|| format!("failed to open audio file: {:?}", path))?;
        let source = Decoder::new(BufReader::new(file)).context("failed to decode audio file")?;
        let duration = info.duration.or_else(|| source.total_duration());

        {
            let sink = self.sink.lock().unwrap();
            let sink = sink.as_ref().context("output not activated")?;
            sink.clear();
            sink.append(source);
            // clear() leaves the sink paused; stay that way until play()
        }

        let mut session = PlaybackSession::new(resource.clone());
        if let Some(duration) = duration {
            session.set_duration(duration);
        }
        *self.session.lock().unwrap() = Some(session);
        self.item_loaded.store(true, Ordering::SeqCst);

        // Duration is announced once per loaded item, as soon as it is known
        if let Some(duration) = duration {
            self.callbacks
                .fire_total_length(clock_format(duration.as_secs_f64()));
        }
        self.callbacks.fire_ready();
        Ok(())
    }

    /// One watcher tick: record the position, fire the periodic callbacks
    /// while playing, and report natural end-of-playback once.
    fn observe(&self) {
        let sink = match *self.sink.lock().unwrap() {
            Some(ref sink) => sink.clone(),
            None => return,
        };

        if !self.item_loaded.load(Ordering::SeqCst) {
            return;
        }

        let position = sink.get_pos();
        let playing = !sink.is_paused() && !sink.empty();

        let (elapsed, total) = {
            let mut session = self.session.lock().unwrap();
            match *session {
                Some(ref mut session) => {
                    session.set_playing(playing);
                    let elapsed = session.observe_elapsed(position);
                    (elapsed.as_secs_f64(), session.duration_seconds())
                }
                None => return,
            }
        };

        if playing {
            self.callbacks.fire_elapsed(clock_format(elapsed));
            self.callbacks.fire_progress(elapsed, total);
        }

        // Natural end: the loaded item ran out
        if sink.empty() && self.item_loaded.swap(false, Ordering::SeqCst) {
            if let Some(ref mut session) = *self.session.lock().unwrap() {
                session.set_playing(false);
            }
            let stopped = self.stopped_cb.lock().unwrap().clone();
            if let Some(stopped) = stopped {
                stopped();
            }
        }
    }

    /// Stop the watcher; its exit drops the output stream.
    fn deactivate(&self) {
        if let Some(stop) = self.watch_stop.lock().unwrap().take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.watcher.lock().unwrap().take() {
            let _ = handle.join();
        }
        *self.sink.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_fresh_player_state() {
        let player = SinkPlayer::new();
        assert!(!player.is_playing());
        assert!(player.session().is_none());
    }

    #[test]
    fn test_prepare_invalid_resource_reports_failure() {
        let player = SinkPlayer::new();
        let (tx, rx) = mpsc::channel();
        player.prepare(
            &Resource::new("https://example.com/stream.mp3"),
            Some(Box::new(move |outcome| {
                let _ = tx.send(outcome);
            })),
            None,
        );
        // Fails at stream creation on headless machines, at the
        // remote-resource check otherwise
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Failure);
    }

    #[test]
    fn test_play_then_pause_clears_playing() {
        let player = SinkPlayer::new();
        player.play();
        player.pause();
        assert!(!player.is_playing());
    }
}
