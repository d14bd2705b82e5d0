// Playback progress presentation
// Formats what a player surface shows; holds no widget-toolkit state

pub mod progress;

pub use progress::{ProgressView, ProgressViewDelegate};
