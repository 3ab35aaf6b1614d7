use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    capture::ClipFormat,
    error::{ConfigError, Result},
    filters::{FilterPreset, FilterRegistry},
    video::{FacingMode, FileSourceProvider, SourceConstraints},
};

/// Main configuration for Lumina
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Display and frame loop settings
    #[serde(default)]
    pub viewfinder: ViewfinderConfig,

    /// Camera and microphone sources
    #[serde(default)]
    pub source: SourceConfig,

    /// Still and clip capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Presets added to the built-in catalog
    #[serde(default)]
    pub filters: FiltersConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.viewfinder.validate()?;
        self.source.validate()?;
        self.capture.validate()?;
        self.filters.registry()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Viewport and frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewfinderConfig {
    /// Initial viewport width in pixels
    pub width: u32,

    /// Initial viewport height in pixels
    pub height: u32,

    /// Frame loop tick rate (Hz)
    pub frame_rate: f64,

    /// Number of threads the compositor draws with
    pub render_threads: usize,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 60.0,
            render_threads: num_cpus::get(),
        }
    }
}

/// Highest frame loop rate accepted; anything faster would tick in under a millisecond
pub const MAX_FRAME_RATE: f64 = 1000.0;

impl ViewfinderConfig {
    /// Time between frame loop ticks, never shorter than one millisecond
    pub fn frame_interval(&self) -> Duration {
        let rate = if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate.min(MAX_FRAME_RATE)
        } else {
            MAX_FRAME_RATE
        };
        Duration::from_secs_f64(1.0 / rate).max(Duration::from_millis(1))
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid("viewfinder.size", format!("{}x{}", self.width, self.height)).into());
        }

        if !(self.frame_rate > 0.0 && self.frame_rate <= MAX_FRAME_RATE) {
            return Err(invalid("viewfinder.frame_rate", self.frame_rate).into());
        }

        if self.render_threads == 0 {
            return Err(invalid("viewfinder.render_threads", self.render_threads).into());
        }

        Ok(())
    }
}

/// Source acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Camera opened when the session starts
    pub facing: FacingMode,

    /// Ideal source width; larger sources are scaled down
    pub desired_width: u32,

    /// Ideal source height; larger sources are scaled down
    pub desired_height: u32,

    /// Ask for a microphone track alongside the camera
    pub want_audio: bool,

    /// Front camera: an image file or a directory of numbered images
    pub front: Option<PathBuf>,

    /// Rear camera: an image file or a directory of numbered images
    pub rear: Option<PathBuf>,

    /// Microphone stand-in (wav, mp3, flac, ogg)
    pub audio: Option<PathBuf>,

    /// Playback rate of image sequences
    pub sequence_fps: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            desired_width: 1920,
            desired_height: 1080,
            want_audio: true,
            front: None,
            rear: None,
            audio: None,
            sequence_fps: 30.0,
        }
    }
}

impl SourceConfig {
    /// What to ask the provider for when opening `facing`
    pub fn constraints(&self, facing: FacingMode) -> SourceConstraints {
        SourceConstraints {
            facing,
            desired_width: self.desired_width,
            desired_height: self.desired_height,
            want_audio: self.want_audio,
        }
    }

    /// A provider serving the configured files
    pub fn file_provider(&self) -> FileSourceProvider {
        FileSourceProvider {
            front: self.front.clone(),
            rear: self.rear.clone(),
            audio: self.audio.clone(),
            sequence_fps: self.sequence_fps,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.desired_width == 0 || self.desired_height == 0 {
            return Err(invalid(
                "source.desired_size",
                format!("{}x{}", self.desired_width, self.desired_height),
            )
            .into());
        }

        if !(self.sequence_fps > 0.0 && self.sequence_fps.is_finite()) {
            return Err(invalid("source.sequence_fps", self.sequence_fps).into());
        }

        Ok(())
    }
}

/// Which clip encoder to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderChoice {
    /// ffmpeg when available, Motion-JPEG otherwise
    #[default]
    Auto,
    Ffmpeg,
    Mjpeg,
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Prefix of suggested filenames
    pub app_name: String,

    /// Still image quality (0.0-1.0]
    pub still_quality: f32,

    /// How long the shutter flash stays lit
    pub flash_duration_ms: u64,

    /// Recording frame rate
    pub clip_fps: u32,

    /// MIME type tried first when recording
    pub preferred_format: String,

    /// MIME type tried when the preferred one is unsupported
    pub fallback_format: String,

    pub encoder: EncoderChoice,

    pub ffmpeg_path: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            app_name: "lumina".to_string(),
            still_quality: 0.95,
            flash_duration_ms: 150,
            clip_fps: 30,
            preferred_format: "video/webm;codecs=vp9".to_string(),
            fallback_format: "video/webm".to_string(),
            encoder: EncoderChoice::Auto,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl CaptureConfig {
    pub fn preferred(&self) -> Result<ClipFormat> {
        self.preferred_format
            .parse()
            .map_err(|_| invalid("capture.preferred_format", &self.preferred_format).into())
    }

    pub fn fallback(&self) -> Result<ClipFormat> {
        self.fallback_format
            .parse()
            .map_err(|_| invalid("capture.fallback_format", &self.fallback_format).into())
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(invalid("capture.app_name", &self.app_name).into());
        }

        if !(self.still_quality > 0.0 && self.still_quality <= 1.0) {
            return Err(invalid("capture.still_quality", self.still_quality).into());
        }

        if self.clip_fps == 0 {
            return Err(invalid("capture.clip_fps", self.clip_fps).into());
        }

        self.preferred()?;
        self.fallback()?;
        Ok(())
    }
}

/// Extra filter presets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Appended after the built-in catalog, in order
    pub extra: Vec<FilterPreset>,
}

impl FiltersConfig {
    /// The built-in catalog plus the configured extras
    pub fn registry(&self) -> Result<FilterRegistry> {
        Ok(FilterRegistry::new().with_extra(self.extra.iter().cloned())?)
    }
}
