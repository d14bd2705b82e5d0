// Playback capability interface
// The small surface both controllers expose to the UI layer, plus the
// shared storage for the optional observer callbacks.

use std::sync::{Arc, Mutex};

use crate::audio::resource::Resource;

/// Outcome of an asynchronous configure/prepare operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Success,
    Failure,
}

/// Periodic elapsed-time callback, fed a formatted `MM:SS` string.
pub type ElapsedCallback = Box<dyn Fn(String) + Send + Sync + 'static>;

/// One-time total-duration callback, fed a formatted `MM:SS` string.
pub type TotalLengthCallback = Box<dyn Fn(String) + Send + Sync + 'static>;

/// Combined progress callback: (elapsed seconds, total seconds).
pub type ProgressCallback = Box<dyn Fn(f64, f64) + Send + Sync + 'static>;

/// Fired once the resource is validated and playable.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Fired once at natural end of playback.
pub type StoppedCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Completion callback for configure/prepare.
pub type CompletionCallback = Box<dyn FnOnce(PlaybackOutcome) + Send + 'static>;

/// The capability interface shared by both playback controllers.
///
/// All operations return immediately; I/O-bound setup runs on background
/// threads and the observer callbacks are invoked from each controller's
/// internal worker thread.
pub trait AudioPlaying: Send + Sync {
    fn set_on_elapsed(&self, callback: ElapsedCallback);
    fn set_on_total_length(&self, callback: TotalLengthCallback);
    fn set_on_progress(&self, callback: ProgressCallback);
    fn set_on_ready(&self, callback: ReadyCallback);

    /// True while output is audible.
    fn is_playing(&self) -> bool;

    /// Bring up the output side and attach the resource; reports the
    /// outcome through `completion`.
    fn configure(&self, resource: &Resource, completion: Option<CompletionCallback>);

    /// Resume output.
    fn play(&self);

    /// Halt output without releasing the device or the loaded resource.
    fn pause(&self);

    /// Load a resource for playback, replacing any current one. `stopped`
    /// fires once when playback reaches its natural end.
    fn prepare(
        &self,
        resource: &Resource,
        completion: Option<CompletionCallback>,
        stopped: Option<StoppedCallback>,
    );
}

/// Shared slots for the four observer callbacks.
///
/// Cloneable so worker threads can hold their own handle; the slots
/// themselves are shared.
#[derive(Default, Clone)]
pub(crate) struct PlayerCallbacks {
    elapsed: Arc<Mutex<Option<ElapsedCallback>>>,
    total_length: Arc<Mutex<Option<TotalLengthCallback>>>,
    progress: Arc<Mutex<Option<ProgressCallback>>>,
    ready: Arc<Mutex<Option<ReadyCallback>>>,
}

impl PlayerCallbacks {
    pub fn set_elapsed(&self, callback: ElapsedCallback) {
        *self.elapsed.lock().unwrap() = Some(callback);
    }

    pub fn set_total_length(&self, callback: TotalLengthCallback) {
        *self.total_length.lock().unwrap() = Some(callback);
    }

    pub fn set_progress(&self, callback: ProgressCallback) {
        *self.progress.lock().unwrap() = Some(callback);
    }

    pub fn set_ready(&self, callback: ReadyCallback) {
        *self.ready.lock().unwrap() = Some(callback);
    }

    pub fn fire_elapsed(&self, text: String) {
        if let Some(ref cb) = *self.elapsed.lock().unwrap() {
            cb(text);
        }
    }

    pub fn fire_total_length(&self, text: String) {
        if let Some(ref cb) = *self.total_length.lock().unwrap() {
            cb(text);
        }
    }

    pub fn fire_progress(&self, elapsed: f64, total: f64) {
        if let Some(ref cb) = *self.progress.lock().unwrap() {
            cb(elapsed, total);
        }
    }

    pub fn fire_ready(&self) {
        if let Some(ref cb) = *self.ready.lock().unwrap() {
            cb();
        }
    }
}

/// Invoke a completion callback if one was supplied.
pub(crate) fn report(completion: Option<CompletionCallback>, outcome: PlaybackOutcome) {
    if let Some(f) = completion {
        f(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_without_callback_is_noop() {
        let callbacks = PlayerCallbacks::default();
        callbacks.fire_elapsed("00:01".to_string());
        callbacks.fire_progress(1.0, 2.0);
        callbacks.fire_ready();
    }

    #[test]
    fn test_set_and_fire() {
        let callbacks = PlayerCallbacks::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        callbacks.set_elapsed(Box::new(move |text| {
            assert_eq!(text, "00:03");
            h.fetch_add(1, Ordering::SeqCst);
        }));

        let h = hits.clone();
        callbacks.set_progress(Box::new(move |elapsed, total| {
            assert_eq!(elapsed, 3.0);
            assert_eq!(total, 10.0);
            h.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.fire_elapsed("00:03".to_string());
        callbacks.fire_progress(3.0, 10.0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clone_shares_slots() {
        let callbacks = PlayerCallbacks::default();
        let worker_handle = callbacks.clone();

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        callbacks.set_ready(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        worker_handle.fire_ready();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_report() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        report(
            Some(Box::new(move |outcome| {
                assert_eq!(outcome, PlaybackOutcome::Failure);
                h.fetch_add(1, Ordering::SeqCst);
            })),
            PlaybackOutcome::Failure,
        );
        report(None, PlaybackOutcome::Success);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
