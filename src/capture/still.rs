use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::{
    error::{CaptureError, Result},
    video::types::{Frame, OutputSurface},
};

/// Brief "shutter" flash shown after a still capture
///
/// Purely visual feedback; it never touches encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashSignal {
    duration: Duration,
    lit_at: Option<Instant>,
}

impl FlashSignal {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            lit_at: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.lit_at = Some(now);
    }

    /// True for `duration` after the last trigger
    pub fn is_lit(&self, now: Instant) -> bool {
        self.lit_at
            .is_some_and(|lit_at| now.saturating_duration_since(lit_at) < self.duration)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for FlashSignal {
    fn default() -> Self {
        Self::new(Duration::from_millis(150))
    }
}

/// Convert a 0..1 quality target to the encoder's 1..100 scale
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// JPEG-encode a frame
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(bytes)
}

/// Encode the composited surface as a still image
///
/// Fails with `EmptySurface` if the surface has a zero dimension or has never
/// shown a frame.
pub fn encode_still(surface: &OutputSurface, quality: f32) -> Result<Vec<u8>> {
    if !surface.has_rendered() {
        return Err(CaptureError::EmptySurface.into());
    }
    encode_jpeg(surface.frame(), jpeg_quality(quality))
}
