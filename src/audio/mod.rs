//! # Audio Tracks
//!
//! Audio that can be muxed into a recorded clip. The session treats the
//! microphone as a black box behind the [`AudioTrack`] trait; this module also
//! provides file-backed tracks (decoded with hound or Symphonia) and a
//! channel-backed track for hosts that capture audio on their own thread.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use lumina::audio::{AudioTrack, FileAudioTrack};
//!
//! # fn main() -> lumina::Result<()> {
//! let mut track = FileAudioTrack::open("ambience.wav")?;
//! let samples = track.read_available(Instant::now());
//! println!("{} Hz, {} new samples", track.spec().sample_rate, samples.len());
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod track;
pub mod types;

pub use loader::AudioLoader;
pub use track::{AudioTrack, ChannelAudioTrack, FileAudioTrack};
pub use types::{AudioData, AudioSpec};
