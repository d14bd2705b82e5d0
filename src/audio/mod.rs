// Audio playback module
// Two interchangeable controllers behind one capability interface:
// EnginePlayer (Symphonia + cpal) and SinkPlayer (rodio)

pub mod controls;
pub mod decoder;
pub mod engine;
pub mod output;
pub mod player;
pub mod resource;
pub mod session;

pub use controls::{
    AudioPlaying, CompletionCallback, ElapsedCallback, PlaybackOutcome, ProgressCallback,
    ReadyCallback, StoppedCallback, TotalLengthCallback,
};
pub use engine::EnginePlayer;
pub use player::SinkPlayer;
pub use resource::Resource;
pub use session::PlaybackSession;
