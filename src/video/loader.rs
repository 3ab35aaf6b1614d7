use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::audio::{AudioTrack, FileAudioTrack};
use crate::error::{Result, SourceError};
use crate::video::source::{AcquiredSource, FacingMode, SourceConstraints, SourceProvider, VideoSource};
use crate::video::types::Frame;

/// A source that always shows the same picture
pub struct StillImageSource {
    frame: Frame,
}

impl StillImageSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }

    /// Decode an image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_frame(path.as_ref())?))
    }
}

impl VideoSource for StillImageSource {
    fn poll(&mut self, _now: Instant) {}

    fn is_ready(&self) -> bool {
        !self.frame.is_empty()
    }

    fn frame(&self) -> Option<&Frame> {
        self.is_ready().then_some(&self.frame)
    }
}

/// Loops a directory of numbered stills (`01_a.png`, `02_b.png`, ...) at a fixed rate
pub struct ImageSequenceSource {
    frames: Vec<Frame>,
    fps: f64,
    started_at: Option<Instant>,
    current: usize,
}

impl ImageSequenceSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            started_at: None,
            current: 0,
        }
    }

    /// Load every supported image in `dir`, ordered by sequence number then name
    pub fn open<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|_| SourceError::LoadFailed {
            path: dir.display().to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image_file(path))
            .collect();
        paths.sort_by_key(|path| sequence_key(path));

        if paths.is_empty() {
            return Err(SourceError::LoadFailed {
                path: format!("{} (no images)", dir.display()),
            }
            .into());
        }

        let frames = paths
            .iter()
            .map(|path| load_frame(path))
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} frame sequence from {:?}", frames.len(), dir);
        Ok(Self::new(frames, fps))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for ImageSequenceSource {
    fn poll(&mut self, now: Instant) {
        if self.frames.is_empty() {
            return;
        }
        let started_at = *self.started_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
        self.current = (elapsed * self.fps) as usize % self.frames.len();
    }

    fn is_ready(&self) -> bool {
        self.started_at.is_some() && !self.frames.is_empty()
    }

    fn frame(&self) -> Option<&Frame> {
        if !self.is_ready() {
            return None;
        }
        self.frames.get(self.current)
    }
}

/// Frames pushed from a capture thread; the newest one wins
pub struct ChannelVideoSource {
    receiver: Receiver<Frame>,
    latest: Option<Frame>,
}

impl ChannelVideoSource {
    /// Create a source and the sender a capture thread feeds it through.
    /// `capacity` bounds how many undrained frames may queue up.
    pub fn new(capacity: usize) -> (Self, SyncSender<Frame>) {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        (
            Self {
                receiver,
                latest: None,
            },
            sender,
        )
    }
}

impl VideoSource for ChannelVideoSource {
    fn poll(&mut self, _now: Instant) {
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => self.latest = Some(frame),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.latest.as_ref().is_some_and(|frame| !frame.is_empty())
    }

    fn frame(&self) -> Option<&Frame> {
        self.latest.as_ref().filter(|frame| !frame.is_empty())
    }
}

/// Serves camera sources from files: one path per facing, plus an optional audio file
///
/// A path may point at a single image or at a directory of numbered images.
#[derive(Debug, Clone, Default)]
pub struct FileSourceProvider {
    pub front: Option<PathBuf>,
    pub rear: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub sequence_fps: f64,
}

impl FileSourceProvider {
    fn path_for(&self, facing: FacingMode) -> Option<&Path> {
        match facing {
            FacingMode::User => self.front.as_deref(),
            FacingMode::Environment => self.rear.as_deref(),
        }
    }

    fn open_video(&self, path: &Path, constraints: &SourceConstraints) -> Result<Box<dyn VideoSource>> {
        let fit = |frame: Frame| frame.fit_within(constraints.desired_width, constraints.desired_height);

        if path.is_dir() {
            let sequence = ImageSequenceSource::open(path, self.sequence_fps)?;
            let frames = sequence.frames.into_iter().map(fit).collect();
            Ok(Box::new(ImageSequenceSource::new(frames, self.sequence_fps)))
        } else {
            Ok(Box::new(StillImageSource::new(fit(load_frame(path)?))))
        }
    }

    fn open_audio(&self) -> Option<Box<dyn AudioTrack>> {
        let path = self.audio.as_ref()?;
        match FileAudioTrack::open(path) {
            Ok(track) => Some(Box::new(track)),
            Err(e) => {
                warn!("Audio track unavailable ({}), continuing without audio", e);
                None
            }
        }
    }
}

impl SourceProvider for FileSourceProvider {
    fn acquire(&mut self, constraints: &SourceConstraints) -> Result<AcquiredSource> {
        let facing = constraints.facing;
        let path = self.path_for(facing).ok_or_else(|| SourceError::Acquisition {
            facing: facing.to_string(),
            reason: "no device configured".to_string(),
        })?;

        let video = self.open_video(path, constraints).map_err(|e| SourceError::Acquisition {
            facing: facing.to_string(),
            reason: e.to_string(),
        })?;

        let audio = if constraints.want_audio { self.open_audio() } else { None };
        if constraints.want_audio && audio.is_none() {
            warn!("No audio track found");
        }

        debug!("Acquired {} source from {:?}", facing, path);
        Ok(AcquiredSource { facing, video, audio })
    }
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path).map_err(|_| SourceError::LoadFailed {
        path: path.display().to_string(),
    })?;
    Ok(Frame::new(image.to_rgb8()))
}

fn is_image_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref(),
        Some("jpg") | Some("jpeg") | Some("png")
    )
}

/// Sort key for names like "01_intro.png": the leading number first, then the full name
fn sequence_key(path: &Path) -> (u32, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let number = stem
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(u32::MAX);
    (number, stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
        Frame::new_filled(width, height, color).as_image().save(path).unwrap();
    }

    #[test]
    fn test_sequence_key_orders_numbered_files() {
        let mut paths = vec![
            PathBuf::from("10_end.png"),
            PathBuf::from("2_middle.png"),
            PathBuf::from("01_start.png"),
            PathBuf::from("cover.png"),
        ];
        paths.sort_by_key(|p| sequence_key(p));
        let names: Vec<_> = paths.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, vec!["01_start.png", "2_middle.png", "10_end.png", "cover.png"]);
    }

    #[test]
    fn test_sequence_not_ready_until_polled() {
        let mut source = ImageSequenceSource::new(
            vec![Frame::new_filled(2, 2, [255, 0, 0]), Frame::new_filled(2, 2, [0, 255, 0])],
            10.0,
        );
        assert!(!source.is_ready());
        assert!(source.frame().is_none());

        let start = Instant::now();
        source.poll(start);
        assert_eq!(source.frame().unwrap().get_pixel(0, 0), [255, 0, 0]);

        source.poll(start + Duration::from_millis(150));
        assert_eq!(source.frame().unwrap().get_pixel(0, 0), [0, 255, 0]);

        // Loops back to the start
        source.poll(start + Duration::from_millis(250));
        assert_eq!(source.frame().unwrap().get_pixel(0, 0), [255, 0, 0]);
    }

    #[test]
    fn test_channel_source_keeps_newest_frame() {
        let (mut source, sender) = ChannelVideoSource::new(4);
        assert!(!source.is_ready());

        sender.send(Frame::new_filled(1, 1, [1, 1, 1])).unwrap();
        sender.send(Frame::new_filled(1, 1, [9, 9, 9])).unwrap();
        source.poll(Instant::now());

        assert!(source.is_ready());
        assert_eq!(source.frame().unwrap().get_pixel(0, 0), [9, 9, 9]);
        assert_eq!(source.dimensions(), Some((1, 1)));
    }

    #[test]
    fn test_provider_scales_to_constraints() {
        let dir = tempdir().unwrap();
        let front = dir.path().join("front.png");
        write_png(&front, 400, 200, [10, 20, 30]);

        let mut provider = FileSourceProvider {
            front: Some(front),
            sequence_fps: 30.0,
            ..Default::default()
        };
        let constraints = SourceConstraints {
            desired_width: 200,
            desired_height: 200,
            want_audio: false,
            ..Default::default()
        };

        let acquired = provider.acquire(&constraints).unwrap();
        assert_eq!(acquired.facing, FacingMode::User);
        assert_eq!(acquired.video.dimensions(), Some((200, 100)));
        assert!(acquired.audio.is_none());
    }

    #[test]
    fn test_provider_missing_facing_is_acquisition_error() {
        let mut provider = FileSourceProvider::default();
        let constraints = SourceConstraints {
            facing: FacingMode::Environment,
            ..Default::default()
        };

        let err = provider.acquire(&constraints).unwrap_err();
        assert!(matches!(
            err,
            crate::error::LuminaError::Source(SourceError::Acquisition { .. })
        ));
    }

    #[test]
    fn test_provider_loads_directory_sequence() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("01_a.png"), 8, 8, [255, 0, 0]);
        write_png(&dir.path().join("02_b.png"), 8, 8, [0, 0, 255]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut provider = FileSourceProvider {
            front: Some(dir.path().to_path_buf()),
            sequence_fps: 1.0,
            ..Default::default()
        };
        let mut acquired = provider
            .acquire(&SourceConstraints { want_audio: false, ..Default::default() })
            .unwrap();

        acquired.video.poll(Instant::now());
        assert_eq!(acquired.video.frame().unwrap().get_pixel(0, 0), [255, 0, 0]);
    }
}
