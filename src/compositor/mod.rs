//! Cover-fit drawing, mirroring and the filter + overlay pass

pub mod engine;
pub mod layout;

pub use engine::{Compositor, RenderOutcome, SkipReason};
pub use layout::{cover_fit, DrawRect, Placement};
