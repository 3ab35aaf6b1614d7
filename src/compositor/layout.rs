/// Where the scaled source lands on the surface, in surface pixels
///
/// `x`/`y` are negative on the axis where the source overflows and is cropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale a source so it covers the whole surface, centring the overflow
///
/// Returns `None` when either rectangle has a zero dimension.
pub fn cover_fit(src_width: u32, src_height: u32, surface_width: u32, surface_height: u32) -> Option<DrawRect> {
    if src_width == 0 || src_height == 0 || surface_width == 0 || surface_height == 0 {
        return None;
    }

    let (sw, sh) = (surface_width as f64, surface_height as f64);
    let source_aspect = src_width as f64 / src_height as f64;
    let surface_aspect = sw / sh;

    let rect = if source_aspect > surface_aspect {
        let width = sh * source_aspect;
        DrawRect {
            x: (sw - width) / 2.0,
            y: 0.0,
            width,
            height: sh,
        }
    } else {
        let height = sw / source_aspect;
        DrawRect {
            x: 0.0,
            y: (sh - height) / 2.0,
            width: sw,
            height,
        }
    };
    Some(rect)
}

/// The cover-fit rectangle plus the mirror transform applied when drawing it
///
/// Mirroring reflects the draw about the surface's vertical centreline
/// (`x -> surface_width - x`). It never changes `rect`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub rect: DrawRect,
    pub mirrored: bool,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl Placement {
    pub fn new(rect: DrawRect, mirrored: bool, surface_width: u32, surface_height: u32) -> Self {
        Self {
            rect,
            mirrored,
            surface_width,
            surface_height,
        }
    }

    /// Map a surface x coordinate into the unmirrored draw space
    pub fn source_x(&self, surface_x: f64) -> f64 {
        if self.mirrored {
            self.surface_width as f64 - surface_x
        } else {
            surface_x
        }
    }

    /// Source column sampled by each surface column (nearest neighbour, pixel centres)
    pub fn column_map(&self, src_width: u32) -> Vec<usize> {
        (0..self.surface_width)
            .map(|x| {
                let draw_x = self.source_x(x as f64 + 0.5);
                sample_index(draw_x, self.rect.x, self.rect.width, src_width)
            })
            .collect()
    }

    /// Source row sampled by each surface row
    pub fn row_map(&self, src_height: u32) -> Vec<usize> {
        (0..self.surface_height)
            .map(|y| sample_index(y as f64 + 0.5, self.rect.y, self.rect.height, src_height))
            .collect()
    }
}

fn sample_index(pos: f64, start: f64, extent: f64, len: u32) -> usize {
    let t = (pos - start) / extent;
    let index = (t * len as f64).floor();
    index.clamp(0.0, len.saturating_sub(1) as f64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(rect: &DrawRect, sw: u32, sh: u32) {
        let eps = 1e-6;
        assert!(rect.width + eps >= sw as f64, "{:?} does not cover width {}", rect, sw);
        assert!(rect.height + eps >= sh as f64, "{:?} does not cover height {}", rect, sh);
        assert!(rect.x <= eps && rect.y <= eps);
        // Symmetric slack
        let right_slack = rect.x + rect.width - sw as f64;
        let bottom_slack = rect.y + rect.height - sh as f64;
        assert!((right_slack + rect.x).abs() < 1e-6);
        assert!((bottom_slack + rect.y).abs() < 1e-6);
    }

    #[test]
    fn test_same_aspect_fills_exactly() {
        let rect = cover_fit(1280, 720, 1920, 1080).unwrap();
        assert_eq!(
            rect,
            DrawRect {
                x: 0.0,
                y: 0.0,
                width: 1920.0,
                height: 1080.0
            }
        );
    }

    #[test]
    fn test_wide_source_on_square_surface() {
        let rect = cover_fit(1920, 1080, 1000, 1000).unwrap();
        assert_eq!(rect.height, 1000.0);
        assert!((rect.width - 1000.0 * 16.0 / 9.0).abs() < 1e-9);
        assert!((rect.x - (1000.0 - rect.width) / 2.0).abs() < 1e-9);
        assert!((rect.x + 388.89).abs() < 0.01);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn test_tall_source_centres_vertically() {
        let rect = cover_fit(720, 1280, 1920, 1080).unwrap();
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.width, 1920.0);
        assert!(rect.y < 0.0);
        assert_covers(&rect, 1920, 1080);
    }

    #[test]
    fn test_cover_fit_always_covers() {
        let sizes = [1u32, 3, 17, 480, 640, 720, 1080, 1920, 4000];
        for &src_w in &sizes {
            for &src_h in &sizes {
                for &(sw, sh) in &[(1920u32, 1080u32), (1000, 1000), (390, 844), (1, 7)] {
                    let rect = cover_fit(src_w, src_h, sw, sh).unwrap();
                    assert_covers(&rect, sw, sh);
                }
            }
        }
    }

    #[test]
    fn test_zero_dimensions() {
        assert!(cover_fit(0, 720, 100, 100).is_none());
        assert!(cover_fit(1280, 720, 100, 0).is_none());
    }

    #[test]
    fn test_mirror_changes_placement_not_size() {
        let rect = cover_fit(1920, 1080, 1000, 1000).unwrap();
        let plain = Placement::new(rect, false, 1000, 1000);
        let mirrored = Placement::new(rect, true, 1000, 1000);

        assert_eq!(plain.rect.width, mirrored.rect.width);
        assert_eq!(plain.rect.height, mirrored.rect.height);

        let plain_cols = plain.column_map(1920);
        let mirrored_cols = mirrored.column_map(1920);
        assert_eq!(plain_cols.len(), mirrored_cols.len());
        // The mirrored draw reads the plain draw right to left
        let reversed: Vec<_> = plain_cols.iter().rev().copied().collect();
        assert_eq!(mirrored_cols, reversed);
        assert_ne!(mirrored_cols, plain_cols);
    }

    #[test]
    fn test_column_map_crops_centre() {
        // 4x1 source on a 2x1 surface: same height, the middle two columns survive
        let rect = cover_fit(4, 1, 2, 1).unwrap();
        let placement = Placement::new(rect, false, 2, 1);
        assert_eq!(placement.column_map(4), vec![1, 2]);
        assert_eq!(placement.row_map(1), vec![0]);
    }
}
