use std::collections::HashSet;

use crate::{
    error::FilterError,
    filters::{
        expression::{EffectChain, EffectOp},
        overlay::OverlayKind,
        preset::FilterPreset,
    },
};

/// Ordered catalog of filter presets
///
/// The catalog is never empty and its order is significant: UI iteration and
/// cycling walk presets in the order they were registered.
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    presets: Vec<FilterPreset>,
}

impl FilterRegistry {
    /// Create a registry holding the built-in presets
    pub fn new() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Append extra presets after the built-in ones
    ///
    /// Names are compared case-insensitively; a clash with any existing preset
    /// rejects the whole batch.
    pub fn with_extra<I>(mut self, extra: I) -> std::result::Result<Self, FilterError>
    where
        I: IntoIterator<Item = FilterPreset>,
    {
        let mut seen: HashSet<String> = self.presets.iter().map(|p| fold_name(&p.name)).collect();
        for preset in extra {
            if !seen.insert(fold_name(&preset.name)) {
                return Err(FilterError::DuplicateName { name: preset.name });
            }
            self.presets.push(preset);
        }
        Ok(self)
    }

    /// Get the preset at `index`
    pub fn preset_at(&self, index: usize) -> std::result::Result<&FilterPreset, FilterError> {
        self.presets.get(index).ok_or(FilterError::IndexOutOfRange {
            index,
            len: self.presets.len(),
        })
    }

    /// Number of presets in the catalog
    pub fn count(&self) -> usize {
        self.presets.len()
    }

    /// Presets in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &FilterPreset> {
        self.presets.iter()
    }

    /// Index of the preset with this name, ignoring case
    pub fn find(&self, name: &str) -> Option<usize> {
        let name = fold_name(name);
        self.presets.iter().position(|p| fold_name(&p.name) == name)
    }

    /// Resolve a preset by name or by numeric index
    pub fn resolve(&self, name_or_index: &str) -> std::result::Result<usize, FilterError> {
        if let Some(index) = self.find(name_or_index) {
            return Ok(index);
        }
        match name_or_index.trim().parse::<usize>() {
            Ok(index) => self.preset_at(index).map(|_| index),
            Err(_) => Err(FilterError::UnknownFilter {
                name: name_or_index.to_string(),
            }),
        }
    }

    /// Step `step` presets away from `index`, wrapping around the catalog
    pub fn cycle(&self, index: usize, step: isize) -> usize {
        let len = self.presets.len() as isize;
        (index as isize + step).rem_euclid(len) as usize
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Preset names compare equal when they match ignoring case, Unicode included
fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

fn builtin_presets() -> Vec<FilterPreset> {
    use EffectOp::*;

    let preset = |name: &str, ops: Vec<EffectOp>, overlay| {
        FilterPreset::new(name, EffectChain::new(ops), overlay)
    };

    vec![
        preset("Normal", vec![], OverlayKind::None),
        preset(
            "Retro",
            vec![Sepia(0.4), Contrast(1.2), Brightness(0.9), Saturate(0.8)],
            OverlayKind::Vignette,
        ),
        preset("B&W", vec![Grayscale(1.0), Contrast(1.1)], OverlayKind::None),
        preset(
            "Warm",
            vec![Sepia(0.3), Saturate(1.4), HueRotate(-15.0)],
            OverlayKind::None,
        ),
        preset(
            "Cool",
            vec![Saturate(1.2), HueRotate(15.0), Brightness(1.1)],
            OverlayKind::None,
        ),
        preset(
            "Soft",
            vec![Brightness(1.1), Contrast(0.9), Saturate(0.9), Blur(0.5)],
            OverlayKind::None,
        ),
        preset(
            "Dreamy",
            vec![Contrast(0.9), Brightness(1.2), Saturate(1.5)],
            OverlayKind::Bloom,
        ),
        preset(
            "Cyber",
            vec![Contrast(1.3), Saturate(1.5), HueRotate(180.0)],
            OverlayKind::None,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_order() {
        let registry = FilterRegistry::new();
        let names: Vec<_> = registry.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Normal", "Retro", "B&W", "Warm", "Cool", "Soft", "Dreamy", "Cyber"]
        );
        assert_eq!(registry.count(), 8);
    }

    #[test]
    fn test_builtin_expressions() {
        let registry = FilterRegistry::new();
        let retro = registry.preset_at(1).unwrap();
        assert_eq!(
            retro.effect_expression(),
            "sepia(0.4) contrast(1.2) brightness(0.9) saturate(0.8)"
        );
        assert_eq!(retro.overlay, OverlayKind::Vignette);
        assert_eq!(registry.preset_at(0).unwrap().effect_expression(), "none");
        assert_eq!(registry.preset_at(6).unwrap().overlay, OverlayKind::Bloom);
        assert_eq!(
            registry.preset_at(3).unwrap().effect_expression(),
            "sepia(0.3) saturate(1.4) hue-rotate(-15deg)"
        );

        // Every built-in round-trips through the parser
        for preset in registry.iter() {
            let reparsed = EffectChain::parse(&preset.effect_expression()).unwrap();
            assert_eq!(reparsed, preset.effect);
        }
    }

    #[test]
    fn test_preset_at_out_of_range() {
        let registry = FilterRegistry::new();
        assert_eq!(
            registry.preset_at(99).unwrap_err(),
            FilterError::IndexOutOfRange { index: 99, len: 8 }
        );
        assert!(registry.preset_at(8).is_err());
        assert!(registry.preset_at(7).is_ok());
    }

    #[test]
    fn test_find_and_resolve() {
        let registry = FilterRegistry::new();
        assert_eq!(registry.find("dreamy"), Some(6));
        assert_eq!(registry.find("b&w"), Some(2));
        assert_eq!(registry.find("sparkle"), None);

        assert_eq!(registry.resolve("CYBER").unwrap(), 7);
        assert_eq!(registry.resolve("4").unwrap(), 4);
        assert!(matches!(registry.resolve("12"), Err(FilterError::IndexOutOfRange { .. })));
        assert!(matches!(registry.resolve("sparkle"), Err(FilterError::UnknownFilter { .. })));
    }

    #[test]
    fn test_cycle_wraps() {
        let registry = FilterRegistry::new();
        assert_eq!(registry.cycle(0, 1), 1);
        assert_eq!(registry.cycle(7, 1), 0);
        assert_eq!(registry.cycle(0, -1), 7);
        assert_eq!(registry.cycle(3, 16), 3);
    }

    #[test]
    fn test_with_extra_appends_and_rejects_duplicates() {
        let faded = FilterPreset::parse("Faded", "sepia(0.2)", OverlayKind::None).unwrap();
        let registry = FilterRegistry::new().with_extra(vec![faded]).unwrap();
        assert_eq!(registry.count(), 9);
        assert_eq!(registry.find("faded"), Some(8));

        let clash = FilterPreset::parse("retro", "none", OverlayKind::None).unwrap();
        assert_eq!(
            FilterRegistry::new().with_extra(vec![clash]).unwrap_err(),
            FilterError::DuplicateName { name: "retro".to_string() }
        );
    }

    #[test]
    fn test_non_ascii_names_fold_consistently() {
        let umlaut = FilterPreset::parse("Ümlaut", "sepia(0.2)", OverlayKind::None).unwrap();
        let registry = FilterRegistry::new().with_extra([umlaut]).unwrap();
        assert_eq!(registry.find("ümlaut"), Some(8));
        assert_eq!(registry.find("ÜMLAUT"), Some(8));
        assert_eq!(registry.resolve("ümlaut").unwrap(), 8);

        let clash = FilterPreset::parse("ümlaut", "none", OverlayKind::None).unwrap();
        assert!(matches!(
            registry.with_extra([clash]),
            Err(FilterError::DuplicateName { .. })
        ));
    }
}
