use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    audio::AudioTrack,
    capture::{
        artifact::CaptureArtifact,
        encoder::{ClipEncoder, EncoderBackend, EncoderRequest, FramePush},
        format::{negotiate, ClipFormat},
        still::{encode_still, FlashSignal},
    },
    config::CaptureConfig,
    error::{CaptureError, CaptureWarning, Result},
    video::types::OutputSurface,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "idle"),
            RecordingState::Recording => write!(f, "recording"),
        }
    }
}

/// What a successful `start_recording` reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingStarted {
    pub format: ClipFormat,
    pub audio_muxed: bool,
    /// Non-fatal conditions, e.g. recording without audio
    pub warnings: Vec<CaptureWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingStats {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub chunks: usize,
}

struct ActiveRecording {
    encoder: Box<dyn ClipEncoder>,
    format: ClipFormat,
    width: u32,
    height: u32,
    started_at: Instant,
    /// Frame slots consumed so far, captured or dropped
    frames_due: u64,
    stats: RecordingStats,
    audio_muxed: bool,
    chunks: Vec<Vec<u8>>,
}

/// Turns the composited surface into stills and clips
///
/// Recording taps the output surface on a fixed schedule independent of the
/// frame loop's tick rate. Encoded chunks are kept in arrival order and
/// concatenated into one clip when recording stops.
pub struct CaptureEngine {
    backend: Box<dyn EncoderBackend>,
    preferred: ClipFormat,
    fallback: ClipFormat,
    clip_fps: u32,
    still_quality: f32,
    flash: FlashSignal,
    active: Option<ActiveRecording>,
}

impl CaptureEngine {
    pub fn new(config: &CaptureConfig, backend: Box<dyn EncoderBackend>) -> Result<Self> {
        Ok(Self {
            preferred: config.preferred()?,
            fallback: config.fallback()?,
            clip_fps: config.clip_fps.max(1),
            still_quality: config.still_quality,
            flash: FlashSignal::new(config.flash_duration()),
            backend,
            active: None,
        })
    }

    pub fn state(&self) -> RecordingState {
        if self.active.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Statistics of the recording in progress
    pub fn stats(&self) -> Option<RecordingStats> {
        self.active.as_ref().map(|rec| rec.stats)
    }

    pub fn flash_active(&self, now: Instant) -> bool {
        self.flash.is_lit(now)
    }

    /// Encode the current surface as a JPEG still and fire the flash
    pub fn capture_still(&mut self, surface: &OutputSurface, now: Instant) -> Result<CaptureArtifact> {
        let bytes = encode_still(surface, self.still_quality)?;
        self.flash.trigger(now);
        debug!("Captured {}x{} still ({} bytes)", surface.width(), surface.height(), bytes.len());
        Ok(CaptureArtifact::image(bytes))
    }

    /// Begin tapping the surface into a clip
    ///
    /// A missing audio track is reported as a warning, not an error. Any
    /// error leaves the engine idle.
    pub fn start_recording(
        &mut self,
        surface: &OutputSurface,
        audio: Option<&mut Box<dyn AudioTrack>>,
        now: Instant,
    ) -> Result<RecordingStarted> {
        if self.active.is_some() {
            return Err(CaptureError::InvalidStateTransition {
                state: RecordingState::Recording.to_string(),
                action: "start recording".to_string(),
            }
            .into());
        }

        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptySurface.into());
        }

        let format = negotiate(self.backend.as_ref(), self.preferred, self.fallback);
        let mut warnings = Vec::new();

        let audio_spec = match audio.as_ref() {
            None => {
                warnings.push(CaptureWarning::NoAudioTrack);
                None
            }
            Some(_) if !format.carries_audio() => {
                warnings.push(CaptureWarning::AudioNotMuxed {
                    format: format.mime_type().to_string(),
                });
                None
            }
            Some(track) => Some(track.spec()),
        };

        let encoder = self.backend.open(EncoderRequest {
            format,
            width,
            height,
            fps: self.clip_fps,
            audio: audio_spec,
        })?;

        let audio_muxed = audio_spec.is_some() && encoder.muxes_audio();
        if audio_spec.is_some() && !audio_muxed {
            warnings.push(CaptureWarning::AudioNotMuxed {
                format: format.mime_type().to_string(),
            });
        }

        // Samples captured before the shutter press don't belong in the clip
        if let Some(track) = audio {
            track.read_available(now);
        }

        for warning in &warnings {
            warn!("Recording: {}", warning);
        }
        info!(
            "Recording started: {} {}x{} @ {}fps via {}",
            format,
            width,
            height,
            self.clip_fps,
            self.backend.name()
        );

        self.active = Some(ActiveRecording {
            encoder,
            format,
            width,
            height,
            started_at: now,
            frames_due: 0,
            stats: RecordingStats::default(),
            audio_muxed,
            chunks: Vec::new(),
        });

        Ok(RecordingStarted {
            format,
            audio_muxed,
            warnings,
        })
    }

    /// Feed the recording from the surface and audio track
    ///
    /// Called every frame loop tick; does nothing while idle. Frames are
    /// pushed on the clip's own fixed-rate schedule, so a slow tick pushes
    /// the current surface several times and a fast one none.
    pub fn capture_tick(
        &mut self,
        surface: &OutputSurface,
        audio: Option<&mut Box<dyn AudioTrack>>,
        now: Instant,
    ) -> Result<()> {
        let fps = self.clip_fps as u64;
        let Some(rec) = self.active.as_mut() else {
            return Ok(());
        };

        let elapsed = now.saturating_duration_since(rec.started_at).as_secs_f64();
        let due = (elapsed * fps as f64).floor() as u64 + 1;
        let mut pending = due.saturating_sub(rec.frames_due);

        // Never catch up more than one second of frames in one go
        if pending > fps {
            let skipped = pending - fps;
            warn!("Recording: {} frames behind, dropping {}", pending, skipped);
            rec.stats.frames_dropped += skipped;
            pending = fps;
        }
        rec.frames_due = due;

        if pending > 0 {
            if surface.dimensions() != (rec.width, rec.height) {
                rec.stats.frames_dropped += pending;
                warn!(
                    "Recording: skipping frame due to size mismatch surface={}x{} recorder={}x{}",
                    surface.width(),
                    surface.height(),
                    rec.width,
                    rec.height
                );
            } else if !surface.has_rendered() {
                rec.stats.frames_dropped += pending;
                debug!("Recording: surface has no frame yet");
            } else {
                let mut backed_up = 0;
                for _ in 0..pending {
                    match rec.encoder.push_video(surface.frame())? {
                        FramePush::Queued => rec.stats.frames_captured += 1,
                        FramePush::Dropped => backed_up += 1,
                    }
                }
                if backed_up > 0 {
                    rec.stats.frames_dropped += backed_up;
                    warn!("Recording: dropped {} frames (encoder backed up)", backed_up);
                }
            }
        }

        if rec.audio_muxed {
            if let Some(track) = audio {
                let samples = track.read_available(now);
                if !samples.is_empty() {
                    rec.encoder.push_audio(&samples)?;
                }
            }
        }

        let chunks = rec.encoder.take_chunks();
        rec.stats.chunks += chunks.len();
        rec.chunks.extend(chunks);
        Ok(())
    }

    /// Finish the recording and return its clip
    ///
    /// Always yields exactly one clip once recording, even when no chunks
    /// arrived or the encoder failed to finalise.
    pub fn stop_recording(
        &mut self,
        surface: &OutputSurface,
        audio: Option<&mut Box<dyn AudioTrack>>,
        now: Instant,
    ) -> Result<CaptureArtifact> {
        if self.active.is_none() {
            return Err(CaptureError::InvalidStateTransition {
                state: RecordingState::Idle.to_string(),
                action: "stop recording".to_string(),
            }
            .into());
        }

        if let Err(e) = self.capture_tick(surface, audio, now) {
            warn!("Recording: final frame not captured: {}", e);
        }

        let Some(mut rec) = self.active.take() else {
            return Err(CaptureError::InvalidStateTransition {
                state: RecordingState::Idle.to_string(),
                action: "stop recording".to_string(),
            }
            .into());
        };

        match rec.encoder.finish() {
            Ok(remaining) => {
                rec.stats.chunks += remaining.len();
                rec.chunks.extend(remaining);
            }
            Err(e) => warn!("Recording: encoder did not finish cleanly: {}", e),
        }

        let payload = rec.chunks.concat();
        info!(
            "Recording stopped: {} frames captured, {} dropped, {} chunks, {} bytes",
            rec.stats.frames_captured,
            rec.stats.frames_dropped,
            rec.stats.chunks,
            payload.len()
        );
        Ok(CaptureArtifact::clip(payload, rec.format))
    }
}
