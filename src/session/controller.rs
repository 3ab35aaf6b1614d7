use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::{
    capture::{ArtifactId, CaptureArtifact, CaptureEngine, EncoderBackend, RecordingStarted, RecordingState},
    compositor::{Compositor, RenderOutcome},
    config::Config,
    error::{CaptureError, Result},
    filters::FilterRegistry,
    session::{
        gallery::Gallery,
        state::{CaptureMode, SessionState},
    },
    video::{AcquiredSource, FacingMode, OutputSurface, SourceProvider},
};

/// What a shutter press did
#[derive(Debug, Clone)]
pub enum ShutterOutcome {
    PhotoCaptured(CaptureArtifact),
    RecordingStarted(RecordingStarted),
    ClipSaved(CaptureArtifact),
}

/// Owns the viewfinder session: state, gallery, compositor, capture engine
/// and the live source
///
/// Every mutation goes through `&mut self`, so a host that needs threads
/// serialises access by giving the controller to a single task (see
/// [`SessionHandle`](crate::session::SessionHandle)).
pub struct SessionController {
    config: Config,
    state: SessionState,
    gallery: Gallery,
    compositor: Compositor,
    capture: CaptureEngine,
    surface: OutputSurface,
    source: Option<AcquiredSource>,
    provider: Box<dyn SourceProvider>,
    frames_rendered: u64,
}

impl SessionController {
    /// Acquire the configured camera and set up the pipeline
    ///
    /// An acquisition failure is fatal to the session.
    pub fn start(
        config: Config,
        mut provider: Box<dyn SourceProvider>,
        backend: Box<dyn EncoderBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(config.filters.registry()?);
        let compositor = Compositor::new(registry, config.viewfinder.render_threads)?;
        let capture = CaptureEngine::new(&config.capture, backend)?;

        let facing = config.source.facing;
        let source = provider
            .acquire(&config.source.constraints(facing))
            .map_err(|e| {
                error!("Could not start session: {}", e);
                e
            })?;

        let surface = OutputSurface::new(config.viewfinder.width, config.viewfinder.height);
        info!(
            "Session started: {} camera, {}x{} viewport, {} encoder",
            facing,
            surface.width(),
            surface.height(),
            capture.backend_name()
        );

        Ok(Self {
            state: SessionState::new(facing),
            gallery: Gallery::new(),
            compositor,
            capture,
            surface,
            source: Some(source),
            provider,
            frames_rendered: 0,
            config,
        })
    }

    /// A copy of the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn registry(&self) -> &FilterRegistry {
        self.compositor.registry()
    }

    pub fn surface(&self) -> &OutputSurface {
        &self.surface
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn recording_state(&self) -> RecordingState {
        self.capture.state()
    }

    /// Follow a display viewport change
    pub fn resize_viewport(&mut self, width: u32, height: u32) {
        if self.surface.dimensions() != (width, height) {
            debug!("Viewport resized to {}x{}", width, height);
        }
        self.surface.resize(width, height);
    }

    /// One frame loop iteration: poll the source, draw, feed any recording
    pub fn tick(&mut self, now: Instant) -> Result<RenderOutcome> {
        if let Some(source) = self.source.as_mut() {
            source.video.poll(now);
        }

        let outcome = self.compositor.render_frame(
            self.source.as_ref().map(|s| s.video.as_ref()),
            &mut self.surface,
            &self.state,
        )?;
        if outcome.is_rendered() {
            self.frames_rendered += 1;
        }

        let audio = self.source.as_mut().and_then(|s| s.audio.as_mut());
        if let Err(e) = self.capture.capture_tick(&self.surface, audio, now) {
            warn!("Recording: frame not captured: {}", e);
        }

        Ok(outcome)
    }

    /// Switch between photo and video
    ///
    /// Rejected while recording; stop the recording first.
    pub fn set_mode(&mut self, mode: CaptureMode) -> Result<()> {
        if mode == self.state.mode {
            return Ok(());
        }
        if self.state.recording {
            return Err(CaptureError::InvalidStateTransition {
                state: RecordingState::Recording.to_string(),
                action: format!("switch to {} mode", mode),
            }
            .into());
        }
        self.state.mode = mode;
        debug!("Mode: {}", mode);
        Ok(())
    }

    /// Make preset `index` the active filter
    pub fn activate_filter(&mut self, index: usize) -> Result<()> {
        let preset = self.registry().preset_at(index)?;
        debug!("Filter: {} ({})", preset.name, preset.effect);
        self.state.active_filter_index = index;
        Ok(())
    }

    /// Activate a preset by name (case-insensitive) or index
    pub fn activate_filter_named(&mut self, name_or_index: &str) -> Result<usize> {
        let index = self.registry().resolve(name_or_index)?;
        self.activate_filter(index)?;
        Ok(index)
    }

    /// Step through the catalog, wrapping at either end
    pub fn cycle_filter(&mut self, step: isize) -> usize {
        let index = self.registry().cycle(self.state.active_filter_index, step);
        self.state.active_filter_index = index;
        index
    }

    /// Flip mirroring without changing cameras
    pub fn toggle_mirror(&mut self) -> bool {
        self.state.mirror_enabled = !self.state.mirror_enabled;
        self.state.mirror_enabled
    }

    /// Swap to the other camera; mirroring follows the new camera
    ///
    /// The current source is stopped before the other one is acquired. If
    /// acquisition fails the session is left without a source and frames are
    /// skipped until a later switch succeeds.
    pub fn switch_facing(&mut self) -> Result<FacingMode> {
        if self.state.recording {
            return Err(CaptureError::InvalidStateTransition {
                state: RecordingState::Recording.to_string(),
                action: "switch camera".to_string(),
            }
            .into());
        }

        let target = self.state.facing.opposite();
        if let Some(mut old) = self.source.take() {
            old.stop();
        }

        let constraints = self.config.source.constraints(target);
        match self.provider.acquire(&constraints) {
            Ok(source) => {
                self.source = Some(source);
                self.state.facing = target;
                self.state.mirror_enabled = target.mirrors();
                info!("Switched to {} camera", target);
                Ok(target)
            }
            Err(e) => {
                error!("Could not switch to {} camera: {}", target, e);
                Err(e)
            }
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Start recording the composited output
    pub fn start_recording(&mut self, now: Instant) -> Result<RecordingStarted> {
        let audio = self.source.as_mut().and_then(|s| s.audio.as_mut());
        let started = self.capture.start_recording(&self.surface, audio, now)?;
        self.state.recording = true;
        Ok(started)
    }

    /// Stop recording and add the clip to the gallery
    pub fn stop_recording(&mut self, now: Instant) -> Result<CaptureArtifact> {
        let audio = self.source.as_mut().and_then(|s| s.audio.as_mut());
        let clip = self.capture.stop_recording(&self.surface, audio, now)?;
        self.state.recording = false;
        self.gallery.push(clip.clone());
        Ok(clip)
    }

    /// Take a still of the composited output and add it to the gallery
    pub fn capture_still(&mut self, now: Instant) -> Result<CaptureArtifact> {
        let still = self.capture.capture_still(&self.surface, now)?;
        self.gallery.push(still.clone());
        Ok(still)
    }

    /// Photo mode takes a still; video mode starts or stops recording
    pub fn on_shutter_pressed(&mut self, now: Instant) -> Result<ShutterOutcome> {
        match (self.state.mode, self.state.recording) {
            (CaptureMode::Photo, _) => self.capture_still(now).map(ShutterOutcome::PhotoCaptured),
            (CaptureMode::Video, false) => self.start_recording(now).map(ShutterOutcome::RecordingStarted),
            (CaptureMode::Video, true) => self.stop_recording(now).map(ShutterOutcome::ClipSaved),
        }
    }

    /// Newest-first snapshot of the gallery
    pub fn list_gallery(&self) -> Vec<CaptureArtifact> {
        self.gallery.list()
    }

    pub fn latest_capture(&self) -> Option<CaptureArtifact> {
        self.gallery.latest().cloned()
    }

    pub fn remove_capture(&mut self, id: ArtifactId) -> bool {
        self.gallery.remove(id).is_some()
    }

    pub fn clear_gallery(&mut self) {
        self.gallery.clear();
    }

    /// Whether the shutter flash is showing
    pub fn flash_active(&self, now: Instant) -> bool {
        self.capture.flash_active(now)
    }

    /// End the session
    ///
    /// An active recording is stopped and its clip kept. The source is
    /// released and the gallery handed back, newest first.
    pub fn finish(mut self, now: Instant) -> Result<Vec<CaptureArtifact>> {
        if self.state.recording {
            info!("Stopping active recording before ending the session");
            self.stop_recording(now)?;
        }
        if let Some(mut source) = self.source.take() {
            source.stop();
        }

        info!(
            "Session ended: {} frames rendered, {} captures",
            self.frames_rendered,
            self.gallery.len()
        );
        Ok(self.gallery.list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::{ArtifactKind, MjpegBackend},
        error::{FilterError, LuminaError, SourceError},
        video::{Frame, SourceConstraints, StillImageSource},
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Hands out solid-colour stills; red for the front camera, blue for the rear
    struct TestProvider {
        fail: Arc<AtomicBool>,
    }

    impl SourceProvider for TestProvider {
        fn acquire(&mut self, constraints: &SourceConstraints) -> Result<AcquiredSource> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SourceError::Acquisition {
                    facing: constraints.facing.to_string(),
                    reason: "permission denied".to_string(),
                }
                .into());
            }
            let color = match constraints.facing {
                FacingMode::User => [255, 0, 0],
                FacingMode::Environment => [0, 0, 255],
            };
            Ok(AcquiredSource {
                facing: constraints.facing,
                video: Box::new(StillImageSource::new(Frame::new_filled(64, 36, color))),
                audio: None,
            })
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.viewfinder.width = 32;
        config.viewfinder.height = 32;
        config.viewfinder.render_threads = 1;
        config
    }

    fn controller_with(fail: Arc<AtomicBool>) -> SessionController {
        SessionController::start(
            test_config(),
            Box::new(TestProvider { fail }),
            Box::new(MjpegBackend::default()),
        )
        .unwrap()
    }

    fn controller() -> SessionController {
        controller_with(Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_acquisition_failure_is_fatal() {
        let result = SessionController::start(
            test_config(),
            Box::new(TestProvider { fail: Arc::new(AtomicBool::new(true)) }),
            Box::new(MjpegBackend::default()),
        );
        let err = result.err().unwrap();
        assert!(matches!(err, LuminaError::Source(SourceError::Acquisition { .. })));
        assert_eq!(err.user_message(), "Could not access camera. Please allow permissions.");
    }

    #[test]
    fn test_activate_filter_is_total_and_idempotent() {
        let mut session = controller();
        for i in 0..session.registry().count() {
            session.activate_filter(i).unwrap();
            session.activate_filter(i).unwrap();
            assert_eq!(session.state().active_filter_index, i);
        }

        session.activate_filter(3).unwrap();
        let err = session.activate_filter(99).unwrap_err();
        assert!(matches!(
            err,
            LuminaError::Filter(FilterError::IndexOutOfRange { index: 99, len: 8 })
        ));
        assert_eq!(session.state().active_filter_index, 3);
    }

    #[test]
    fn test_cycle_and_named_filters() {
        let mut session = controller();
        assert_eq!(session.cycle_filter(-1), 7);
        assert_eq!(session.cycle_filter(1), 0);
        assert_eq!(session.activate_filter_named("dreamy").unwrap(), 6);
        assert!(session.activate_filter_named("sparkle").is_err());
        assert_eq!(session.state().active_filter_index, 6);
    }

    #[test]
    fn test_still_before_first_frame() {
        let mut session = controller();
        let err = session.on_shutter_pressed(Instant::now()).unwrap_err();
        assert!(matches!(err, LuminaError::Capture(CaptureError::EmptySurface)));
        assert!(session.list_gallery().is_empty());
    }

    #[test]
    fn test_gallery_is_newest_first() {
        let mut session = controller();
        let now = Instant::now();
        assert!(session.tick(now).unwrap().is_rendered());

        let mut ids = Vec::new();
        for _ in 0..3 {
            match session.on_shutter_pressed(now).unwrap() {
                ShutterOutcome::PhotoCaptured(artifact) => ids.push(artifact.id),
                other => panic!("expected a photo, got {:?}", other),
            }
        }
        assert!(session.flash_active(now));

        let listed: Vec<_> = session.list_gallery().iter().map(|a| a.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
        assert_eq!(session.latest_capture().unwrap().id, ids[0]);

        assert!(session.remove_capture(ids[1]));
        assert_eq!(session.list_gallery().len(), 2);
    }

    #[test]
    fn test_recording_cycle_yields_one_clip() {
        let mut session = controller();
        let start = Instant::now();
        session.tick(start).unwrap();

        // Stop from idle is rejected without touching the gallery
        assert!(session.stop_recording(start).is_err());

        session.set_mode(CaptureMode::Video).unwrap();
        match session.on_shutter_pressed(start).unwrap() {
            ShutterOutcome::RecordingStarted(started) => {
                assert!(!started.warnings.is_empty());
            }
            other => panic!("expected recording to start, got {:?}", other),
        }
        assert!(session.state().recording);
        assert!(session.start_recording(start).is_err());

        for ms in [33u64, 66, 100] {
            session.tick(start + Duration::from_millis(ms)).unwrap();
        }

        let clip = match session.on_shutter_pressed(start + Duration::from_millis(120)).unwrap() {
            ShutterOutcome::ClipSaved(clip) => clip,
            other => panic!("expected a clip, got {:?}", other),
        };
        assert_eq!(clip.kind, ArtifactKind::Clip);
        assert!(!clip.is_empty());
        assert!(!session.state().recording);

        let gallery = session.list_gallery();
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery[0].id, clip.id);
    }

    #[test]
    fn test_mode_switch_rejected_while_recording() {
        let mut session = controller();
        let now = Instant::now();
        session.tick(now).unwrap();
        session.set_mode(CaptureMode::Video).unwrap();
        session.on_shutter_pressed(now).unwrap();

        let err = session.set_mode(CaptureMode::Photo).unwrap_err();
        assert!(matches!(
            err,
            LuminaError::Capture(CaptureError::InvalidStateTransition { .. })
        ));
        assert_eq!(session.state().mode, CaptureMode::Video);
        assert!(session.state().recording);

        // Re-selecting the current mode is harmless
        session.set_mode(CaptureMode::Video).unwrap();
    }

    #[test]
    fn test_switch_facing_follows_mirror_policy() {
        let mut session = controller();
        let now = Instant::now();
        assert!(session.state().mirror_enabled);

        assert_eq!(session.switch_facing().unwrap(), FacingMode::Environment);
        assert!(!session.state().mirror_enabled);
        session.tick(now).unwrap();
        assert_eq!(session.surface().frame().get_pixel(16, 16), [0, 0, 255]);

        assert!(session.toggle_mirror());
        assert_eq!(session.switch_facing().unwrap(), FacingMode::User);
        assert!(session.state().mirror_enabled);
    }

    #[test]
    fn test_failed_switch_leaves_no_source() {
        let fail = Arc::new(AtomicBool::new(false));
        let mut session = controller_with(fail.clone());
        let now = Instant::now();

        fail.store(true, Ordering::SeqCst);
        let err = session.switch_facing().unwrap_err();
        assert!(matches!(err, LuminaError::Source(SourceError::Acquisition { .. })));
        assert!(!session.has_source());
        assert_eq!(session.state().facing, FacingMode::User);

        // Frames skip rather than fail
        assert!(!session.tick(now).unwrap().is_rendered());

        fail.store(false, Ordering::SeqCst);
        assert_eq!(session.switch_facing().unwrap(), FacingMode::Environment);
        assert!(session.tick(now).unwrap().is_rendered());
    }

    #[test]
    fn test_finish_keeps_active_clip() {
        let mut session = controller();
        let now = Instant::now();
        session.tick(now).unwrap();
        session.capture_still(now).unwrap();
        session.set_mode(CaptureMode::Video).unwrap();
        session.start_recording(now).unwrap();

        let gallery = session.finish(now + Duration::from_millis(50)).unwrap();
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery[0].kind, ArtifactKind::Clip);
        assert_eq!(gallery[1].kind, ArtifactKind::Image);
    }
}
