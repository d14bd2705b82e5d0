// Media probing
// Validates that a resource is readable before playback and reports the
// fields the player surface needs

pub mod probe;

pub use probe::{probe, MediaInfo};
