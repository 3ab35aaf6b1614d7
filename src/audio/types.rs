use std::path::PathBuf;

/// Sample layout of an audio track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioSpec {
    /// Interleaved samples per second
    pub fn samples_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Decoded audio with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    pub spec: AudioSpec,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path
    pub file_path: PathBuf,
}

impl AudioData {
    /// Build from interleaved samples, deriving the duration
    pub fn new(samples: Vec<f32>, spec: AudioSpec, file_path: PathBuf) -> Self {
        let per_second = spec.samples_per_second().max(1);
        let duration = samples.len() as f64 / per_second as f64;
        Self {
            samples,
            spec,
            duration,
            file_path,
        }
    }

    /// Get time in seconds for an interleaved sample index
    pub fn time_for_sample(&self, sample_index: usize) -> f64 {
        sample_index as f64 / self.spec.samples_per_second().max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_samples() {
        let spec = AudioSpec { sample_rate: 1000, channels: 2 };
        let data = AudioData::new(vec![0.0; 4000], spec, PathBuf::from("tone.wav"));
        assert_eq!(data.duration, 2.0);
        assert_eq!(data.time_for_sample(1000), 0.5);
    }
}
