//! # Lumina
//!
//! A live camera viewfinder with a real-time filter compositor.
//!
//! Every frame, the current camera image is cover-fitted onto the output
//! surface, mirrored for the front camera, run through the active filter
//! preset and finished with the preset's overlay. Stills and clips are taken
//! from that composited surface, so what is captured is exactly what the
//! viewfinder shows.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use lumina::{
//!     capture::MjpegBackend,
//!     config::Config,
//!     session::{SessionController, ShutterOutcome},
//! };
//!
//! # fn main() -> lumina::Result<()> {
//! let mut config = Config::default();
//! config.source.front = Some("selfie.png".into());
//!
//! let provider = config.source.file_provider();
//! let mut session = SessionController::start(
//!     config,
//!     Box::new(provider),
//!     Box::new(MjpegBackend::default()),
//! )?;
//!
//! session.activate_filter_named("retro")?;
//! session.tick(Instant::now())?;
//! if let ShutterOutcome::PhotoCaptured(photo) = session.on_shutter_pressed(Instant::now())? {
//!     std::fs::write(photo.suggested_filename("lumina"), photo.bytes())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`filters`] - Effect chains, overlays and the preset catalog
//! - [`compositor`] - Cover-fit placement, mirroring and the filter pass
//! - [`capture`] - Stills, clip encoders and the recording state machine
//! - [`session`] - Session state, gallery and the controller that owns them
//! - [`video`] / [`audio`] - Frames and the source seams
//! - [`config`] - Configuration management
//!
//! ## Custom Effects
//!
//! Anything that implements [`FrameEffect`](filters::FrameEffect) can run over
//! a frame:
//!
//! ```rust,no_run
//! use lumina::filters::FrameEffect;
//! use lumina::video::Frame;
//!
//! struct Invert;
//!
//! impl FrameEffect for Invert {
//!     fn name(&self) -> &str {
//!         "invert"
//!     }
//!
//!     fn apply(&self, frame: &mut Frame) -> lumina::Result<()> {
//!         for value in frame.as_raw_mut() {
//!             *value = 255 - *value;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod audio;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod error;
pub mod filters;
pub mod session;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    compositor::Compositor,
    config::Config,
    error::{LuminaError, Result},
    filters::{FilterPreset, FilterRegistry, FrameEffect},
    session::{SessionController, SessionHandle},
};
