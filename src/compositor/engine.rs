use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::{
    compositor::layout::{cover_fit, Placement},
    error::{LuminaError, Result},
    filters::{FilterRegistry, FrameEffect},
    session::state::SessionState,
    video::{
        source::VideoSource,
        types::{Frame, OutputSurface},
    },
};

/// Why a tick drew nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The source has not decoded a frame yet
    SourceNotReady,
    /// No source is attached (e.g. between device switches)
    NoSource,
    /// The surface has a zero dimension
    EmptySurface,
}

/// Result of one compositor tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    Rendered(Placement),
    Skipped(SkipReason),
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered(_))
    }
}

/// Per-frame drawing pipeline
///
/// Each tick scales the current source frame onto the output surface with
/// cover cropping, mirrors it when the session asks for it, runs the active
/// preset's effect chain and finally draws the preset's overlay on top. The
/// overlay is never passed through the effect chain.
pub struct Compositor {
    registry: Arc<FilterRegistry>,
    pool: ThreadPool,
}

impl Compositor {
    /// Create a compositor drawing with `threads` worker threads
    pub fn new(registry: Arc<FilterRegistry>, threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("lumina-render-{}", i))
            .build()
            .map_err(|e| LuminaError::generic(format!("Failed to start render pool: {}", e)))?;

        info!(
            "Compositor ready: {} presets, {} render threads",
            registry.count(),
            pool.current_num_threads()
        );
        Ok(Self { registry, pool })
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    /// Draw one frame
    ///
    /// Missing or not-yet-ready sources skip the frame without error. The only
    /// error is an active filter index outside the catalog.
    pub fn render_frame(
        &self,
        source: Option<&dyn VideoSource>,
        surface: &mut OutputSurface,
        state: &SessionState,
    ) -> Result<RenderOutcome> {
        let preset = self.registry.preset_at(state.active_filter_index)?;

        let Some(source) = source else {
            return Ok(RenderOutcome::Skipped(SkipReason::NoSource));
        };
        if surface.frame().is_empty() {
            return Ok(RenderOutcome::Skipped(SkipReason::EmptySurface));
        }
        let frame = match source.frame() {
            Some(frame) if source.is_ready() && !frame.is_empty() => frame,
            _ => return Ok(RenderOutcome::Skipped(SkipReason::SourceNotReady)),
        };

        let (surface_width, surface_height) = surface.dimensions();
        let Some(rect) = cover_fit(frame.width(), frame.height(), surface_width, surface_height) else {
            return Ok(RenderOutcome::Skipped(SkipReason::EmptySurface));
        };
        let placement = Placement::new(rect, state.mirror_enabled, surface_width, surface_height);

        let target = surface.frame_mut();
        self.pool.install(|| -> Result<()> {
            draw(frame, target, &placement);

            preset.effect.apply(target)?;

            if let Some(overlay) = preset.overlay.effect() {
                overlay.apply(target)?;
            }
            Ok(())
        })?;
        surface.mark_rendered();

        Ok(RenderOutcome::Rendered(placement))
    }
}

/// Nearest-neighbour blit through precomputed row/column maps
fn draw(source: &Frame, target: &mut Frame, placement: &Placement) {
    let columns = placement.column_map(source.width());
    let rows = placement.row_map(source.height());
    let src = source.as_raw();
    let src_stride = source.width() as usize * 3;
    let dst_stride = target.width() as usize * 3;

    debug!(
        "Drawing {}x{} source at {:.1},{:.1} {:.1}x{:.1} (mirrored: {})",
        source.width(),
        source.height(),
        placement.rect.x,
        placement.rect.y,
        placement.rect.width,
        placement.rect.height,
        placement.mirrored
    );

    target
        .as_raw_mut()
        .par_chunks_mut(dst_stride)
        .zip(rows.par_iter())
        .for_each(|(dst_row, &src_y)| {
            let src_row = &src[src_y * src_stride..(src_y + 1) * src_stride];
            for (px, &src_x) in dst_row.chunks_exact_mut(3).zip(columns.iter()) {
                px.copy_from_slice(&src_row[src_x * 3..src_x * 3 + 3]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::FilterError,
        video::loader::{ImageSequenceSource, StillImageSource},
    };
    use std::time::Instant;

    fn compositor() -> Compositor {
        Compositor::new(Arc::new(FilterRegistry::new()), 2).unwrap()
    }

    /// Left half red, right half blue
    fn split_frame(width: u32, height: u32) -> Frame {
        let mut frame = Frame::new_black(width, height);
        for y in 0..height {
            for x in 0..width {
                let color = if x < width / 2 { [255, 0, 0] } else { [0, 0, 255] };
                frame.set_pixel(x, y, color);
            }
        }
        frame
    }

    fn state(filter: usize, mirror: bool) -> SessionState {
        SessionState {
            active_filter_index: filter,
            mirror_enabled: mirror,
            ..SessionState::default()
        }
    }

    #[test]
    fn test_renders_cover_fit_placement() {
        let compositor = compositor();
        let source = StillImageSource::new(Frame::new_filled(192, 108, [90, 90, 90]));
        let mut surface = OutputSurface::new(100, 100);

        let outcome = compositor
            .render_frame(Some(&source), &mut surface, &state(0, false))
            .unwrap();

        match outcome {
            RenderOutcome::Rendered(placement) => {
                assert_eq!(placement.rect.height, 100.0);
                assert!(placement.rect.width > 177.0 && placement.rect.width < 178.0);
            }
            other => panic!("expected a rendered frame, got {:?}", other),
        }
        assert!(surface.has_rendered());
        assert_eq!(surface.frame().get_pixel(50, 50), [90, 90, 90]);
    }

    #[test]
    fn test_mirroring_flips_pixels_only() {
        let compositor = compositor();
        let source = StillImageSource::new(split_frame(40, 20));

        let mut plain = OutputSurface::new(40, 20);
        let mut mirrored = OutputSurface::new(40, 20);
        let a = compositor.render_frame(Some(&source), &mut plain, &state(0, false)).unwrap();
        let b = compositor.render_frame(Some(&source), &mut mirrored, &state(0, true)).unwrap();

        let (RenderOutcome::Rendered(a), RenderOutcome::Rendered(b)) = (a, b) else {
            panic!("both frames should render");
        };
        assert_eq!(a.rect, b.rect);

        assert_eq!(plain.frame().get_pixel(0, 10), [255, 0, 0]);
        assert_eq!(mirrored.frame().get_pixel(0, 10), [0, 0, 255]);
        assert_eq!(mirrored.frame().get_pixel(39, 10), [255, 0, 0]);
    }

    #[test]
    fn test_skips_without_ready_source() {
        let compositor = compositor();
        let mut surface = OutputSurface::new(10, 10);

        let outcome = compositor.render_frame(None, &mut surface, &state(0, false)).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::NoSource));

        // Sequences are not ready until polled
        let sequence = ImageSequenceSource::new(vec![Frame::new_filled(4, 4, [1, 1, 1])], 30.0);
        let outcome = compositor
            .render_frame(Some(&sequence), &mut surface, &state(0, false))
            .unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::SourceNotReady));
        assert!(!surface.has_rendered());

        let mut sequence = sequence;
        sequence.poll(Instant::now());
        assert!(compositor
            .render_frame(Some(&sequence), &mut surface, &state(0, false))
            .unwrap()
            .is_rendered());
    }

    #[test]
    fn test_empty_surface_skips() {
        let compositor = compositor();
        let source = StillImageSource::new(Frame::new_filled(4, 4, [1, 1, 1]));
        let mut surface = OutputSurface::new(0, 10);

        let outcome = compositor.render_frame(Some(&source), &mut surface, &state(0, false)).unwrap();
        assert_eq!(outcome, RenderOutcome::Skipped(SkipReason::EmptySurface));
    }

    #[test]
    fn test_invalid_filter_index_is_an_error() {
        let compositor = compositor();
        let source = StillImageSource::new(Frame::new_filled(4, 4, [1, 1, 1]));
        let mut surface = OutputSurface::new(4, 4);

        let err = compositor
            .render_frame(Some(&source), &mut surface, &state(99, false))
            .unwrap_err();
        assert!(matches!(
            err,
            LuminaError::Filter(FilterError::IndexOutOfRange { index: 99, len: 8 })
        ));
    }

    #[test]
    fn test_filter_and_overlay_applied() {
        let compositor = compositor();
        let source = StillImageSource::new(Frame::new_filled(60, 60, [200, 60, 60]));

        // B&W
        let mut surface = OutputSurface::new(60, 60);
        compositor.render_frame(Some(&source), &mut surface, &state(2, false)).unwrap();
        let [r, g, b] = surface.frame().get_pixel(30, 30);
        assert_eq!(r, g);
        assert_eq!(g, b);

        // Retro darkens the corners with its vignette
        let mut surface = OutputSurface::new(60, 60);
        compositor.render_frame(Some(&source), &mut surface, &state(1, false)).unwrap();
        let centre = surface.frame().get_pixel(30, 30);
        let corner = surface.frame().get_pixel(0, 0);
        assert!(corner[0] < centre[0]);
    }
}
