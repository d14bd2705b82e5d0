// Error types for the audio plumbing
use thiserror::Error;

/// Errors raised by the decoder/output layers.
///
/// These stay internal to the crate's plumbing; across the callback boundary
/// they collapse into [`PlaybackOutcome::Failure`](crate::audio::PlaybackOutcome).
#[derive(Debug, Error)]
pub enum AudioError {
    /// The resource cannot be opened or holds no decodable audio track.
    #[error("resource is not playable: {0}")]
    Unplayable(String),

    /// The output device/stream could not be activated.
    #[error("audio session activation failed: {0}")]
    Session(String),

    /// The demuxer or decoder failed beyond a skippable packet.
    #[error("decode error: {0}")]
    Decode(String),

    /// The output device wants a sample format we do not produce.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}
