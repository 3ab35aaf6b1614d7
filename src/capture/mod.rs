//! # Capture
//!
//! Stills and clips are taken from the composited output surface, so they
//! always show exactly what the viewfinder shows: filters and overlays
//! included.
//!
//! Clip encoding sits behind [`EncoderBackend`]. Two backends ship:
//!
//! - **ffmpeg**: WebM (VP9 or VP8 + Opus) through the ffmpeg command line tool
//! - **mjpeg**: in-process Motion-JPEG, video only, always available

pub mod artifact;
pub mod encoder;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod format;
pub mod recorder;
pub mod still;

pub use artifact::{ArtifactId, ArtifactKind, ArtifactPayload, CaptureArtifact};
pub use encoder::{ClipEncoder, EncoderBackend, EncoderRequest, FramePush, MjpegBackend};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegBackend;
pub use format::{negotiate, ClipFormat};
pub use recorder::{CaptureEngine, RecordingStarted, RecordingState, RecordingStats};
pub use still::{encode_still, FlashSignal};

use tracing::warn;

use crate::{
    config::{CaptureConfig, EncoderChoice},
    error::{CaptureError, Result},
};

/// Build the clip encoder backend the configuration asks for
///
/// `auto` uses ffmpeg when it answers, and falls back to Motion-JPEG otherwise.
pub fn backend_from_config(config: &CaptureConfig) -> Result<Box<dyn EncoderBackend>> {
    match config.encoder {
        EncoderChoice::Mjpeg => Ok(Box::new(MjpegBackend::default())),
        EncoderChoice::Ffmpeg => ffmpeg_backend(config).ok_or_else(|| {
            CaptureError::EncodingFailed {
                reason: format!("ffmpeg not available at {}", config.ffmpeg_path.display()),
            }
            .into()
        }),
        EncoderChoice::Auto => Ok(ffmpeg_backend(config).unwrap_or_else(|| {
            warn!("ffmpeg not found, recording clips as Motion-JPEG without audio");
            Box::new(MjpegBackend::default())
        })),
    }
}

#[cfg(feature = "ffmpeg")]
fn ffmpeg_backend(config: &CaptureConfig) -> Option<Box<dyn EncoderBackend>> {
    FfmpegBackend::detect(&config.ffmpeg_path).map(|backend| Box::new(backend) as Box<dyn EncoderBackend>)
}

#[cfg(not(feature = "ffmpeg"))]
fn ffmpeg_backend(_config: &CaptureConfig) -> Option<Box<dyn EncoderBackend>> {
    None
}
