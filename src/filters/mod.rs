//! # Filter System
//!
//! Filters are declarative: each preset pairs an [`EffectChain`] (an ordered
//! list of colour and blur adjustments, written as a CSS-style expression) with
//! an optional [`OverlayKind`] drawn on top of the filtered image.
//!
//! ## Built-in Presets
//!
//! Normal, Retro (vignette), B&W, Warm, Cool, Soft, Dreamy (bloom), Cyber.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lumina::filters::{EffectChain, FilterRegistry, FrameEffect};
//! use lumina::video::Frame;
//!
//! let registry = FilterRegistry::new();
//! let retro = registry.preset_at(registry.find("retro").unwrap()).unwrap();
//!
//! let mut frame = Frame::new_filled(64, 64, [180, 140, 90]);
//! retro.effect.apply(&mut frame).unwrap();
//!
//! let custom: EffectChain = "grayscale(1) contrast(1.1)".parse().unwrap();
//! assert_eq!(custom.to_string(), "grayscale(1) contrast(1.1)");
//! ```

pub mod expression;
pub mod overlay;
pub mod preset;
pub mod registry;
pub mod traits;

pub use expression::{ColorMatrix, EffectChain, EffectOp};
pub use overlay::{Bloom, OverlayKind, Vignette};
pub use preset::FilterPreset;
pub use registry::FilterRegistry;
pub use traits::FrameEffect;
