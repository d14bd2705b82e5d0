// Progress view model
// Presentational only: elapsed/total time strings, a progress ratio and a
// play/pause control title, plus a control-pressed notification for a
// delegate. Rendering is left to whatever UI layer sits on top.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::audio::controls::AudioPlaying;
use crate::timefmt::clock_format;

const PLAY_TITLE: &str = "Play";
const PAUSE_TITLE: &str = "Pause";

/// Receives control-press notifications from a [`ProgressView`].
pub trait ProgressViewDelegate: Send + Sync {
    fn control_pressed(&self, view: &ProgressView);
}

pub struct ProgressView {
    title: Mutex<String>,
    elapsed_text: Mutex<String>,
    total_text: Mutex<String>,
    progress: Mutex<f32>,
    playing: AtomicBool,
    delegate: Mutex<Option<Weak<dyn ProgressViewDelegate>>>,
}

impl ProgressView {
    pub fn new() -> Self {
        Self {
            title: Mutex::new(String::new()),
            elapsed_text: Mutex::new(clock_format(0.0)),
            total_text: Mutex::new(clock_format(0.0)),
            progress: Mutex::new(0.0),
            playing: AtomicBool::new(false),
            delegate: Mutex::new(None),
        }
    }

    /// The delegate is held weakly; dropping it makes control presses a no-op.
    pub fn set_delegate(&self, delegate: &Arc<dyn ProgressViewDelegate>) {
        *self.delegate.lock().unwrap() = Some(Arc::downgrade(delegate));
    }

    /// Wire this view to a player's observer callbacks.
    pub fn attach(self: &Arc<Self>, player: &dyn AudioPlaying) {
        let view = self.clone();
        player.set_on_elapsed(Box::new(move |text| view.set_elapsed_text(text)));

        let view = self.clone();
        player.set_on_total_length(Box::new(move |text| view.set_total_text(text)));

        let view = self.clone();
        player.set_on_progress(Box::new(move |elapsed, total| {
            view.update_progress(elapsed, total)
        }));
    }

    /// Back to the blank state: zero times, zero progress, Play control.
    pub fn reset(&self) {
        *self.elapsed_text.lock().unwrap() = clock_format(0.0);
        *self.total_text.lock().unwrap() = clock_format(0.0);
        *self.progress.lock().unwrap() = 0.0;
        self.playing.store(false, Ordering::SeqCst);
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock().unwrap() = title.into();
    }

    pub fn title(&self) -> String {
        self.title.lock().unwrap().clone()
    }

    pub fn set_elapsed_text(&self, text: String) {
        *self.elapsed_text.lock().unwrap() = text;
    }

    pub fn elapsed_text(&self) -> String {
        self.elapsed_text.lock().unwrap().clone()
    }

    pub fn set_total_text(&self, text: String) {
        *self.total_text.lock().unwrap() = text;
    }

    pub fn total_text(&self) -> String {
        self.total_text.lock().unwrap().clone()
    }

    /// Update the bar from a progress observation. Unknown or zero
    /// duration shows an empty bar.
    pub fn update_progress(&self, elapsed: f64, total: f64) {
        let ratio = if total > 0.0 && elapsed > 0.0 {
            (elapsed / total).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
        *self.progress.lock().unwrap() = ratio;
    }

    /// Fill ratio for the progress bar, 0.0 to 1.0.
    pub fn progress(&self) -> f32 {
        *self.progress.lock().unwrap()
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    /// Title for the play/pause control.
    pub fn control_title(&self) -> &'static str {
        if self.playing.load(Ordering::SeqCst) {
            PAUSE_TITLE
        } else {
            PLAY_TITLE
        }
    }

    /// Called by the UI layer when the play/pause control is pressed.
    pub fn control_tapped(&self) {
        let delegate = self.delegate.lock().unwrap().clone();
        if let Some(delegate) = delegate.and_then(|weak| weak.upgrade()) {
            delegate.control_pressed(self);
        }
    }
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::controls::{
        CompletionCallback, ElapsedCallback, PlayerCallbacks, ProgressCallback, ReadyCallback,
        StoppedCallback, TotalLengthCallback,
    };
    use crate::audio::resource::Resource;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_blank_state() {
        let view = ProgressView::new();
        assert_eq!(view.elapsed_text(), "00:00");
        assert_eq!(view.total_text(), "00:00");
        assert_eq!(view.progress(), 0.0);
        assert_eq!(view.control_title(), "Play");
    }

    #[test]
    fn test_progress_ratio() {
        let view = ProgressView::new();
        view.update_progress(30.0, 120.0);
        assert!((view.progress() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_progress_guards_degenerate_durations() {
        let view = ProgressView::new();
        view.update_progress(10.0, 0.0);
        assert_eq!(view.progress(), 0.0);
        // an observation past the declared end pins the bar at full
        view.update_progress(130.0, 120.0);
        assert_eq!(view.progress(), 1.0);
    }

    #[test]
    fn test_reset() {
        let view = ProgressView::new();
        view.set_elapsed_text("01:10".to_string());
        view.update_progress(70.0, 140.0);
        view.set_playing(true);

        view.reset();
        assert_eq!(view.elapsed_text(), "00:00");
        assert_eq!(view.progress(), 0.0);
        assert_eq!(view.control_title(), "Play");
    }

    #[test]
    fn test_control_title_follows_playing() {
        let view = ProgressView::new();
        view.set_playing(true);
        assert_eq!(view.control_title(), "Pause");
        view.set_playing(false);
        assert_eq!(view.control_title(), "Play");
    }

    struct CountingDelegate {
        hits: AtomicUsize,
    }

    impl ProgressViewDelegate for CountingDelegate {
        fn control_pressed(&self, _view: &ProgressView) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_delegate_notified() {
        let view = ProgressView::new();
        let delegate = Arc::new(CountingDelegate {
            hits: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn ProgressViewDelegate> = delegate.clone();
        view.set_delegate(&as_dyn);

        view.control_tapped();
        view.control_tapped();
        assert_eq!(delegate.hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_delegate_is_noop() {
        let view = ProgressView::new();
        {
            let delegate: Arc<dyn ProgressViewDelegate> = Arc::new(CountingDelegate {
                hits: AtomicUsize::new(0),
            });
            view.set_delegate(&delegate);
        }
        // must not panic or leak a call into freed state
        view.control_tapped();
    }

    /// A controller double: stores the callbacks and lets the test fire them.
    struct FakePlayer {
        callbacks: PlayerCallbacks,
    }

    impl AudioPlaying for FakePlayer {
        fn set_on_elapsed(&self, callback: ElapsedCallback) {
            self.callbacks.set_elapsed(callback);
        }
        fn set_on_total_length(&self, callback: TotalLengthCallback) {
            self.callbacks.set_total_length(callback);
        }
        fn set_on_progress(&self, callback: ProgressCallback) {
            self.callbacks.set_progress(callback);
        }
        fn set_on_ready(&self, callback: ReadyCallback) {
            self.callbacks.set_ready(callback);
        }
        fn is_playing(&self) -> bool {
            false
        }
        fn configure(&self, _resource: &Resource, _completion: Option<CompletionCallback>) {}
        fn play(&self) {}
        fn pause(&self) {}
        fn prepare(
            &self,
            _resource: &Resource,
            _completion: Option<CompletionCallback>,
            _stopped: Option<StoppedCallback>,
        ) {
        }
    }

    #[test]
    fn test_attach_feeds_the_view() {
        let view = Arc::new(ProgressView::new());
        let player = FakePlayer {
            callbacks: PlayerCallbacks::default(),
        };
        view.attach(&player);

        player.callbacks.fire_elapsed("00:42".to_string());
        player.callbacks.fire_total_length("03:30".to_string());
        player.callbacks.fire_progress(42.0, 210.0);

        assert_eq!(view.elapsed_text(), "00:42");
        assert_eq!(view.total_text(), "03:30");
        assert!((view.progress() - 0.2).abs() < 1e-6);
    }
}
