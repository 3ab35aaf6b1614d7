//! # Viewfinder Session
//!
//! The session ties a camera source, the compositor and the capture engine
//! together. [`SessionController`] is the synchronous core; [`SessionHandle`]
//! runs it on a tokio task at the viewfinder frame rate and takes commands
//! from any number of callers.

pub mod controller;
pub mod gallery;
pub mod handle;
pub mod state;

pub use crate::capture::CaptureArtifact;
pub use controller::{SessionController, ShutterOutcome};
pub use gallery::Gallery;
pub use handle::SessionHandle;
pub use state::{CaptureMode, SessionState};
