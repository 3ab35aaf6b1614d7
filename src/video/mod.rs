//! # Video Frames and Sources
//!
//! Pixel buffers, the compositor's output surface, and the seams through which
//! camera frames enter the viewfinder.

pub mod loader;
pub mod source;
pub mod types;

pub use loader::{ChannelVideoSource, FileSourceProvider, ImageSequenceSource, StillImageSource};
pub use source::{AcquiredSource, FacingMode, SourceConstraints, SourceProvider, VideoSource};
pub use types::{Frame, OutputSurface};
