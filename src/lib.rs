// Tonearm - audio playback controllers with progress reporting
// Module declarations
pub mod audio;
pub mod error;
pub mod metadata;
pub mod settings;
pub mod timefmt;
pub mod view;

pub use audio::{
    AudioPlaying, EnginePlayer, PlaybackOutcome, PlaybackSession, Resource, SinkPlayer,
};
pub use error::AudioError;
pub use metadata::{probe, MediaInfo};
pub use settings::PlayerSettings;
pub use timefmt::clock_format;
pub use view::{ProgressView, ProgressViewDelegate};
