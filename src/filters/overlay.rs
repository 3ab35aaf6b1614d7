use std::fmt;

use image::imageops::{self, FilterType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{error::Result, filters::traits::FrameEffect, video::types::Frame};

/// Full-surface layer composited after the filtered base image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    #[default]
    None,
    Vignette,
    Bloom,
}

static VIGNETTE: Vignette = Vignette {
    inner_ratio: 1.0 / 3.0,
    outer_ratio: 1.0,
    max_alpha: 0.6,
};

static BLOOM: Bloom = Bloom {
    threshold: 0.6,
    strength: 0.35,
    downscale: 4,
};

impl OverlayKind {
    /// The pass that draws this overlay, if any
    pub fn effect(self) -> Option<&'static dyn FrameEffect> {
        match self {
            OverlayKind::None => None,
            OverlayKind::Vignette => Some(&VIGNETTE),
            OverlayKind::Bloom => Some(&BLOOM),
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayKind::None => write!(f, "none"),
            OverlayKind::Vignette => write!(f, "vignette"),
            OverlayKind::Bloom => write!(f, "bloom"),
        }
    }
}

/// Radial darkening centred on the frame
///
/// Transparent inside `inner_ratio * height`, ramping linearly to black at
/// `max_alpha` opacity at `outer_ratio * height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vignette {
    pub inner_ratio: f32,
    pub outer_ratio: f32,
    pub max_alpha: f32,
}

impl Vignette {
    /// Overlay opacity at distance `d` from the centre of a frame `height` pixels tall
    pub fn alpha_at(&self, d: f32, height: f32) -> f32 {
        let inner = height * self.inner_ratio;
        let outer = height * self.outer_ratio;
        if outer <= inner {
            return if d >= outer { self.max_alpha } else { 0.0 };
        }
        self.max_alpha * ((d - inner) / (outer - inner)).clamp(0.0, 1.0)
    }
}

impl FrameEffect for Vignette {
    fn name(&self) -> &str {
        "vignette"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        let (width, height) = frame.dimensions();
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let h = height as f32;
        let row_len = width as usize * 3;

        frame
            .as_raw_mut()
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                let dy = y as f32 + 0.5 - cy;
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let dx = x as f32 + 0.5 - cx;
                    let alpha = self.alpha_at((dx * dx + dy * dy).sqrt(), h);
                    if alpha > 0.0 {
                        let keep = 1.0 - alpha;
                        for c in px.iter_mut() {
                            *c = (*c as f32 * keep).round() as u8;
                        }
                    }
                }
            });
        Ok(())
    }
}

/// Soft glow around bright areas, screen-blended so it only ever brightens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bloom {
    /// Luma (0..1) below which a pixel contributes no glow
    pub threshold: f32,
    pub strength: f32,
    /// The glow is computed at 1/downscale resolution
    pub downscale: u32,
}

impl Bloom {
    fn glow(&self, frame: &Frame) -> image::RgbImage {
        let (width, height) = frame.dimensions();
        let factor = self.downscale.max(1);
        let small_w = (width / factor).max(1);
        let small_h = (height / factor).max(1);

        let mut small = imageops::resize(frame.as_image(), small_w, small_h, FilterType::Triangle);
        let span = (1.0 - self.threshold).max(f32::EPSILON);
        for px in small.pixels_mut() {
            let [r, g, b] = px.0.map(|c| c as f32 / 255.0);
            let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;
            let weight = ((luma - self.threshold) / span).clamp(0.0, 1.0);
            px.0 = px.0.map(|c| (c as f32 * weight).round() as u8);
        }

        let sigma = (small_h as f32 / 40.0).max(1.0);
        let blurred = imageops::blur(&small, sigma);
        imageops::resize(&blurred, width, height, FilterType::Triangle)
    }
}

impl FrameEffect for Bloom {
    fn name(&self) -> &str {
        "bloom"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        let glow = self.glow(frame);
        let strength = self.strength;

        frame
            .as_raw_mut()
            .par_iter_mut()
            .zip(glow.as_raw().par_iter())
            .for_each(|(c, g)| {
                // screen: 1 - (1 - c)(1 - s*g)
                let base = *c as f32;
                let lift = (255.0 - base) * strength * (*g as f32 / 255.0);
                *c = (base + lift).round().min(255.0) as u8;
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vignette_alpha_profile() {
        let h = 900.0;
        assert_eq!(VIGNETTE.alpha_at(0.0, h), 0.0);
        assert_eq!(VIGNETTE.alpha_at(300.0, h), 0.0);
        assert!((VIGNETTE.alpha_at(600.0, h) - 0.3).abs() < 1e-5);
        assert!((VIGNETTE.alpha_at(900.0, h) - 0.6).abs() < 1e-5);
        assert!((VIGNETTE.alpha_at(5000.0, h) - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_vignette_darkens_corners_only() {
        let mut frame = Frame::new_filled(90, 60, [200, 200, 200]);
        OverlayKind::Vignette.effect().unwrap().apply(&mut frame).unwrap();

        assert_eq!(frame.get_pixel(45, 30), [200, 200, 200]);
        let corner = frame.get_pixel(0, 0)[0];
        assert!(corner < 200);
        assert!(corner >= 80);
    }

    #[test]
    fn test_bloom_never_darkens() {
        let mut frame = Frame::new_black(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                let v = ((x + y) * 4) as u8;
                frame.set_pixel(x, y, [v, v / 2, 255 - v]);
            }
        }
        let before = frame.clone();
        OverlayKind::Bloom.effect().unwrap().apply(&mut frame).unwrap();

        for (after, original) in frame.as_raw().iter().zip(before.as_raw()) {
            assert!(after >= original);
        }
    }

    #[test]
    fn test_bloom_brightens_highlights() {
        let mut frame = Frame::new_filled(16, 16, [220, 220, 220]);
        OverlayKind::Bloom.effect().unwrap().apply(&mut frame).unwrap();
        assert!(frame.get_pixel(8, 8)[0] > 220);

        // Dark frames have nothing to bloom
        let mut dark = Frame::new_filled(16, 16, [40, 40, 40]);
        OverlayKind::Bloom.effect().unwrap().apply(&mut dark).unwrap();
        assert_eq!(dark.get_pixel(8, 8), [40, 40, 40]);
    }

    #[test]
    fn test_none_has_no_effect() {
        assert!(OverlayKind::None.effect().is_none());
        assert_eq!(OverlayKind::default(), OverlayKind::None);
    }
}
