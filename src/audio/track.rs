use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Instant;

use tracing::debug;

use crate::audio::{
    loader::AudioLoader,
    types::{AudioData, AudioSpec},
};
use crate::error::Result;

/// A live audio track that can be muxed into a recording
pub trait AudioTrack: Send {
    /// Sample layout of everything this track produces
    fn spec(&self) -> AudioSpec;

    /// Interleaved samples that arrived since the previous call
    fn read_available(&mut self, now: Instant) -> Vec<f32>;

    /// Release the underlying device
    fn stop(&mut self) {}
}

/// Plays a decoded audio file back in real time, as if it were a microphone
pub struct FileAudioTrack {
    data: AudioData,
    started_at: Option<Instant>,
    cursor: usize,
    stopped: bool,
}

impl FileAudioTrack {
    pub fn new(data: AudioData) -> Self {
        Self {
            data,
            started_at: None,
            cursor: 0,
            stopped: false,
        }
    }

    /// Decode a file (wav, mp3, flac, ogg, ...)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = AudioLoader::load(path)?;
        debug!("Audio track ready: {:.1}s", data.duration);
        Ok(Self::new(data))
    }
}

impl AudioTrack for FileAudioTrack {
    fn spec(&self) -> AudioSpec {
        self.data.spec
    }

    fn read_available(&mut self, now: Instant) -> Vec<f32> {
        if self.stopped {
            return Vec::new();
        }

        let started_at = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();

        // Keep whole sample frames together
        let channels = self.data.spec.channels.max(1) as usize;
        let frames_due = (elapsed * self.data.spec.sample_rate as f64) as usize;
        let target = (frames_due * channels).min(self.data.samples.len());

        if target <= self.cursor {
            return Vec::new();
        }

        let samples = self.data.samples[self.cursor..target].to_vec();
        self.cursor = target;
        samples
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Audio track fed by another thread, e.g. a capture callback
pub struct ChannelAudioTrack {
    spec: AudioSpec,
    receiver: Receiver<Vec<f32>>,
}

impl ChannelAudioTrack {
    /// Create a track and the sender that feeds it
    pub fn new(spec: AudioSpec) -> (Self, Sender<Vec<f32>>) {
        let (sender, receiver) = mpsc::channel();
        (Self { spec, receiver }, sender)
    }
}

impl AudioTrack for ChannelAudioTrack {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn read_available(&mut self, _now: Instant) -> Vec<f32> {
        let mut samples = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(block) => samples.extend(block),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn tone(seconds: usize) -> AudioData {
        let spec = AudioSpec { sample_rate: 100, channels: 2 };
        AudioData::new(vec![0.25; 200 * seconds], spec, PathBuf::from("tone.wav"))
    }

    #[test]
    fn test_file_track_is_paced_by_clock() {
        let mut track = FileAudioTrack::new(tone(2));
        let start = Instant::now();

        assert!(track.read_available(start).is_empty());

        let half = track.read_available(start + Duration::from_millis(500));
        assert_eq!(half.len(), 100);

        let rest = track.read_available(start + Duration::from_secs(10));
        assert_eq!(rest.len(), 300);

        assert!(track.read_available(start + Duration::from_secs(11)).is_empty());
    }

    #[test]
    fn test_stopped_track_is_silent() {
        let mut track = FileAudioTrack::new(tone(1));
        let start = Instant::now();
        track.read_available(start);
        track.stop();
        assert!(track.read_available(start + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_channel_track_drains_in_order() {
        let (mut track, sender) = ChannelAudioTrack::new(AudioSpec::default());
        sender.send(vec![0.1, 0.2]).unwrap();
        sender.send(vec![0.3]).unwrap();

        assert_eq!(track.read_available(Instant::now()), vec![0.1, 0.2, 0.3]);
        assert!(track.read_available(Instant::now()).is_empty());
    }
}
