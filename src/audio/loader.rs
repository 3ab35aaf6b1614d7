use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::audio::types::{AudioData, AudioSpec};
use crate::error::{Result, SourceError};

/// Decodes audio files that stand in for a microphone track
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file and return interleaved f32 samples
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        let extension = Self::detect_format(path).unwrap_or_default();

        match extension.as_str() {
            "wav" => Self::load_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::load_with_symphonia(path),
            _ => Err(SourceError::UnsupportedFormat { format: extension }.into()),
        }
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<AudioData> {
        let load_failed = || SourceError::LoadFailed {
            path: path.display().to_string(),
        };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| Self::int_to_float(s, bit_depth)))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| load_failed())?
            }
        };

        debug!(
            "Loaded WAV {:?}: {} Hz, {} channels, {} samples",
            path,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(AudioData::new(
            samples,
            AudioSpec {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            },
            path.to_path_buf(),
        ))
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<AudioData> {
        let load_failed = || SourceError::LoadFailed {
            path: path.display().to_string(),
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        // First track with a decodable codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;
        let track_id = track.id;

        let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
            SourceError::InvalidParameters {
                details: "No sample rate found".to_string(),
            }
        })?;
        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| SourceError::InvalidParameters {
                details: "No channel information found".to_string(),
            })?
            .count() as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                    });
                    if buf.capacity() < decoded.capacity() * decoded.spec().channels.count() {
                        *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    }
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            }
        }

        Ok(AudioData::new(
            samples,
            AudioSpec {
                sample_rate,
                channels,
            },
            path.to_path_buf(),
        ))
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            // hound hands 8-bit samples back already centred on zero
            8 => sample as f32 / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LuminaError;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("test.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("test.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("test"), None);
    }

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(-128, 8), -1.0);
        assert_eq!(AudioLoader::int_to_float(64, 8), 0.5);
    }

    #[test]
    fn test_load_wav() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(16384i16).unwrap();
        }
        writer.finalize().unwrap();

        let data = AudioLoader::load(&path).unwrap();
        assert_eq!(data.spec, AudioSpec { sample_rate: 8000, channels: 1 });
        assert_eq!(data.samples.len(), 800);
        assert!((data.duration - 0.1).abs() < 1e-9);
        assert_eq!(data.samples[0], 0.5);
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.xyz");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"dummy content").unwrap();

        match AudioLoader::load(&file_path) {
            Err(LuminaError::Source(SourceError::UnsupportedFormat { format })) => {
                assert_eq!(format, "xyz")
            }
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }
}
