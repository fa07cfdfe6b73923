// Audio preview: resolve a media URL, pick an audio-only stream and turn it
// into an MP3 preview that can be played back, saved or discarded.

pub mod cli;
pub mod config;
pub mod engines;
pub mod pipeline;

pub use cli::run;
