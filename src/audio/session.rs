// Playback session state
// One loaded resource and what the UI layer needs to know about it.

use std::time::Duration;

use crate::audio::resource::Resource;

/// State of one loaded audio resource.
///
/// Created when a resource is loaded, mutated by play/pause and by the
/// periodic timing observations, replaced when a new resource is prepared.
/// Observed elapsed time never moves backwards for the life of the session:
/// late or duplicate observations are clamped.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    resource: Resource,
    elapsed: Duration,
    duration: Option<Duration>,
    playing: bool,
}

impl PlaybackSession {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            elapsed: Duration::ZERO,
            duration: None,
            playing: false,
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Total length in seconds, 0.0 while unknown.
    pub fn duration_seconds(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Record a timing observation, clamped so elapsed time is
    /// monotonically non-decreasing. Returns the recorded value.
    pub fn observe_elapsed(&mut self, observed: Duration) -> Duration {
        if observed > self.elapsed {
            self.elapsed = observed;
        }
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(Resource::new("/music/track.flac"))
    }

    #[test]
    fn test_initial_state() {
        let s = session();
        assert_eq!(s.elapsed(), Duration::ZERO);
        assert_eq!(s.duration(), None);
        assert_eq!(s.duration_seconds(), 0.0);
        assert!(!s.is_playing());
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let mut s = session();
        assert_eq!(s.observe_elapsed(Duration::from_secs(2)), Duration::from_secs(2));
        // a stale observation does not move the clock backwards
        assert_eq!(s.observe_elapsed(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(s.observe_elapsed(Duration::from_secs(3)), Duration::from_secs(3));
        assert_eq!(s.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_play_pause_flag() {
        let mut s = session();
        s.set_playing(true);
        assert!(s.is_playing());
        s.set_playing(false);
        assert!(!s.is_playing());
    }

    #[test]
    fn test_duration() {
        let mut s = session();
        s.set_duration(Duration::from_secs(240));
        assert_eq!(s.duration_seconds(), 240.0);
    }
}
