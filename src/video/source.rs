use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{audio::AudioTrack, error::Result, video::types::Frame};

/// Which physical camera a source comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing camera, shown mirrored to the viewer
    #[default]
    User,
    /// Rear-facing camera
    Environment,
}

impl FacingMode {
    /// The other camera
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    /// Front sources mirror, rear sources do not
    pub fn mirrors(self) -> bool {
        matches!(self, FacingMode::User)
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// What the session asks a source provider for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConstraints {
    pub facing: FacingMode,
    /// Ideal width; larger sources are scaled down to fit
    pub desired_width: u32,
    /// Ideal height; larger sources are scaled down to fit
    pub desired_height: u32,
    pub want_audio: bool,
}

impl Default for SourceConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            desired_width: 1920,
            desired_height: 1080,
            want_audio: true,
        }
    }
}

/// A live video source the compositor reads from
///
/// The compositor only borrows the current frame; it never keeps a copy
/// beyond the frame being drawn.
pub trait VideoSource: Send {
    /// Advance to the newest available frame
    fn poll(&mut self, now: Instant);

    /// True once the source has decoded enough to expose a frame and its dimensions
    fn is_ready(&self) -> bool;

    /// The current frame, if ready
    fn frame(&self) -> Option<&Frame>;

    /// Intrinsic width and height of the current frame
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frame().map(Frame::dimensions)
    }

    /// Release the underlying device. Called before a source is replaced.
    fn stop(&mut self) {}
}

/// A video source plus its optional audio track, as handed out by a provider
pub struct AcquiredSource {
    pub facing: FacingMode,
    pub video: Box<dyn VideoSource>,
    pub audio: Option<Box<dyn AudioTrack>>,
}

impl AcquiredSource {
    /// Stop both tracks
    pub fn stop(&mut self) {
        self.video.stop();
        if let Some(audio) = self.audio.as_mut() {
            audio.stop();
        }
    }
}

impl fmt::Debug for AcquiredSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredSource")
            .field("facing", &self.facing)
            .field("ready", &self.video.is_ready())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}

/// Black-box provider of camera and microphone sources
///
/// Fails with [`SourceError::Acquisition`](crate::error::SourceError::Acquisition)
/// when the device is unavailable or permission is denied.
pub trait SourceProvider: Send {
    fn acquire(&mut self, constraints: &SourceConstraints) -> Result<AcquiredSource>;
}
