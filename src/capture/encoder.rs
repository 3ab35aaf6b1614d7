use crate::{
    audio::AudioSpec,
    capture::{format::ClipFormat, still::encode_jpeg},
    error::{CaptureError, Result},
    video::types::Frame,
};

/// Parameters for opening a clip encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderRequest {
    pub format: ClipFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Layout of the audio to mux, if any
    pub audio: Option<AudioSpec>,
}

/// What happened to a frame handed to an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePush {
    Queued,
    /// The encoder is backed up; the frame was discarded
    Dropped,
}

/// A source of clip encoders
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this backend can produce `format`
    fn supports(&self, format: ClipFormat) -> bool;

    /// The format this backend always supports
    fn native_format(&self) -> ClipFormat;

    fn open(&self, request: EncoderRequest) -> Result<Box<dyn ClipEncoder>>;
}

/// An open encoder for one recording
///
/// Frames and audio go in as they are captured; encoded bytes come out as
/// chunks, in order. Concatenating every chunk gives the finished clip.
pub trait ClipEncoder: Send {
    /// True if audio pushed into this encoder ends up in the clip
    fn muxes_audio(&self) -> bool;

    /// Never blocks: an encoder that cannot keep up drops the frame
    fn push_video(&mut self, frame: &Frame) -> Result<FramePush>;

    /// Interleaved samples in the layout given by the request
    fn push_audio(&mut self, samples: &[f32]) -> Result<()>;

    /// Chunks encoded since the last call
    fn take_chunks(&mut self) -> Vec<Vec<u8>>;

    /// Flush and close, returning the chunks not yet taken
    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>>;
}

/// In-process Motion-JPEG encoder: every frame becomes one JPEG chunk
#[derive(Debug, Clone, Copy)]
pub struct MjpegBackend {
    pub quality: u8,
}

impl Default for MjpegBackend {
    fn default() -> Self {
        Self { quality: 85 }
    }
}

impl EncoderBackend for MjpegBackend {
    fn name(&self) -> &str {
        "mjpeg"
    }

    fn supports(&self, format: ClipFormat) -> bool {
        format == ClipFormat::MotionJpeg
    }

    fn native_format(&self) -> ClipFormat {
        ClipFormat::MotionJpeg
    }

    fn open(&self, request: EncoderRequest) -> Result<Box<dyn ClipEncoder>> {
        if !self.supports(request.format) {
            return Err(CaptureError::UnsupportedFormat {
                mime: request.format.mime_type().to_string(),
            }
            .into());
        }
        Ok(Box::new(MjpegEncoder {
            quality: self.quality,
            width: request.width,
            height: request.height,
            pending: Vec::new(),
        }))
    }
}

struct MjpegEncoder {
    quality: u8,
    width: u32,
    height: u32,
    pending: Vec<Vec<u8>>,
}

impl ClipEncoder for MjpegEncoder {
    fn muxes_audio(&self) -> bool {
        false
    }

    fn push_video(&mut self, frame: &Frame) -> Result<FramePush> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(CaptureError::EncodingFailed {
                reason: format!(
                    "frame is {}x{}, recording is {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            }
            .into());
        }
        self.pending.push(encode_jpeg(frame, self.quality)?);
        Ok(FramePush::Queued)
    }

    fn push_audio(&mut self, _samples: &[f32]) -> Result<()> {
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>> {
        Ok(self.pending)
    }
}
