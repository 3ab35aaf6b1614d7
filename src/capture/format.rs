use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::{capture::encoder::EncoderBackend, error::CaptureError};

/// Container + codec of a recorded clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipFormat {
    /// WebM with VP9 video and Opus audio
    WebmVp9,
    /// WebM with VP8 video and Opus audio; the baseline WebM variant
    WebmVp8,
    /// Concatenated JPEG frames, video only
    MotionJpeg,
}

impl ClipFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ClipFormat::WebmVp9 => "video/webm;codecs=vp9",
            ClipFormat::WebmVp8 => "video/webm;codecs=vp8",
            ClipFormat::MotionJpeg => "video/x-motion-jpeg",
        }
    }

    /// File extension of the container
    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::WebmVp9 | ClipFormat::WebmVp8 => "webm",
            ClipFormat::MotionJpeg => "mjpeg",
        }
    }

    /// Whether the container can carry an audio stream
    pub fn carries_audio(&self) -> bool {
        !matches!(self, ClipFormat::MotionJpeg)
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for ClipFormat {
    type Err = CaptureError;

    /// Parse a MIME type such as `video/webm;codecs=vp9`
    ///
    /// A bare `video/webm` names the baseline VP8 variant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '"')
            .collect::<String>()
            .to_lowercase();

        let mut parts = normalized.split(';');
        let essence = parts.next().unwrap_or_default();
        let codecs = parts
            .find_map(|param| param.strip_prefix("codecs="))
            .map(|codecs| codecs.split(',').next().unwrap_or_default().to_string());

        let format = match (essence, codecs.as_deref()) {
            ("video/webm", Some("vp9") | Some("vp09")) => ClipFormat::WebmVp9,
            ("video/webm", Some("vp8") | None) => ClipFormat::WebmVp8,
            ("video/x-motion-jpeg", None) | ("video/mjpeg", None) => ClipFormat::MotionJpeg,
            _ => {
                return Err(CaptureError::UnsupportedFormat {
                    mime: s.to_string(),
                })
            }
        };
        Ok(format)
    }
}

/// Pick the clip format for a new recording
///
/// The preferred format wins if the backend supports it, then the fallback,
/// then whatever the backend produces natively. Never fails, so negotiation
/// cannot block a recording from starting.
pub fn negotiate(backend: &dyn EncoderBackend, preferred: ClipFormat, fallback: ClipFormat) -> ClipFormat {
    if backend.supports(preferred) {
        debug!("Recording as preferred format {}", preferred);
        return preferred;
    }
    if backend.supports(fallback) {
        debug!("{} unsupported by {}, falling back to {}", preferred, backend.name(), fallback);
        return fallback;
    }

    let native = backend.native_format();
    warn!(
        "{} supports neither {} nor {}, recording as {}",
        backend.name(),
        preferred,
        fallback,
        native
    );
    native
}
