use serde::{Deserialize, Serialize};

use crate::{
    error::FilterError,
    filters::{expression::EffectChain, overlay::OverlayKind},
};

/// A named filter + overlay configuration
///
/// Presets are immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPreset {
    pub name: String,
    /// Serialised as its CSS-style expression
    pub effect: EffectChain,
    #[serde(default)]
    pub overlay: OverlayKind,
}

impl FilterPreset {
    pub fn new(name: impl Into<String>, effect: EffectChain, overlay: OverlayKind) -> Self {
        Self {
            name: name.into(),
            effect,
            overlay,
        }
    }

    /// Build a preset from an effect expression such as `"grayscale(1) contrast(1.1)"`
    pub fn parse(
        name: impl Into<String>,
        expression: &str,
        overlay: OverlayKind,
    ) -> std::result::Result<Self, FilterError> {
        Ok(Self::new(name, EffectChain::parse(expression)?, overlay))
    }

    /// Canonical form of the effect expression
    pub fn effect_expression(&self) -> String {
        self.effect.to_string()
    }
}
