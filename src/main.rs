use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use lumina::{
    capture::backend_from_config,
    config::Config,
    session::{CaptureMode, SessionController, SessionHandle, ShutterOutcome},
    video::FacingMode,
};

#[derive(Parser)]
#[command(
    name = "lumina",
    version,
    about = "Live camera viewfinder with real-time filters, stills and clip recording",
    long_about = "Lumina composites a camera source through a filter preset onto a viewport, then takes a still or records a clip of exactly what the viewfinder shows. Camera and microphone are stood in for by image files, image sequences and audio files."
)]
struct Cli {
    /// Front camera: an image file or a directory of numbered images
    #[arg(long)]
    front: Option<PathBuf>,

    /// Rear camera: an image file or a directory of numbered images
    #[arg(long)]
    rear: Option<PathBuf>,

    /// Microphone stand-in (WAV, MP3, FLAC, OGG)
    #[arg(short, long)]
    audio: Option<PathBuf>,

    /// Filter preset by name or index
    #[arg(short, long)]
    filter: Option<String>,

    /// photo takes one still, video records a clip
    #[arg(short, long, default_value = "photo")]
    mode: CaptureMode,

    /// Clip length in seconds (video mode)
    #[arg(short, long, default_value_t = 3.0, value_parser = parse_seconds)]
    duration: f64,

    /// Directory the captures are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Viewport width
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height
    #[arg(long)]
    height: Option<u32>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the filter catalog and exit
    #[arg(long)]
    list_filters: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Lumina v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    if cli.list_filters {
        let registry = config.filters.registry()?;
        for (index, preset) in registry.iter().enumerate() {
            println!("{:>2}  {:<10} {}  [{}]", index, preset.name, preset.effect, preset.overlay);
        }
        return Ok(());
    }

    let backend = backend_from_config(&config.capture)?;
    let provider = config.source.file_provider();
    let mut controller = SessionController::start(config.clone(), Box::new(provider), backend)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if let Some(filter) = &cli.filter {
        let index = controller
            .activate_filter_named(filter)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        info!("Using filter {}", controller.registry().preset_at(index)?.name);
    }
    controller.set_mode(cli.mode)?;

    let frame_interval = config.viewfinder.frame_interval();
    let session = SessionHandle::spawn(controller, frame_interval);

    // Let the viewfinder show a few frames before the shutter
    tokio::time::sleep(frame_interval * 4).await;
    capture(&session, cli.mode, cli.duration).await?;

    let gallery = session.finish().await?;
    fs::create_dir_all(&cli.output).with_context(|| format!("creating {:?}", cli.output))?;
    for artifact in &gallery {
        let path = cli.output.join(artifact.suggested_filename(&config.capture.app_name));
        fs::write(&path, artifact.bytes()).with_context(|| format!("writing {:?}", path))?;
        info!("Saved {} ({} bytes) to {:?}", artifact.kind, artifact.len(), path);
    }

    info!("Done: {} capture(s) in {:?}", gallery.len(), cli.output);
    Ok(())
}

/// A finite, non-negative number of seconds
fn parse_seconds(value: &str) -> std::result::Result<f64, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    if Duration::try_from_secs_f64(seconds).is_err() {
        return Err(format!("duration must be a finite, non-negative number of seconds, got '{}'", value));
    }
    Ok(seconds)
}

/// Command line flags take precedence over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if cli.front.is_some() {
        config.source.front = cli.front.clone();
    }
    if cli.rear.is_some() {
        config.source.rear = cli.rear.clone();
    }
    if cli.audio.is_some() {
        config.source.audio = cli.audio.clone();
    }
    if let Some(width) = cli.width {
        config.viewfinder.width = width;
    }
    if let Some(height) = cli.height {
        config.viewfinder.height = height;
    }

    // Only a rear camera given: start on it
    if config.source.front.is_none() && config.source.rear.is_some() {
        config.source.facing = FacingMode::Environment;
    }
}

async fn capture(session: &SessionHandle, mode: CaptureMode, duration: f64) -> Result<()> {
    match session.shutter().await? {
        ShutterOutcome::PhotoCaptured(photo) => {
            info!("Captured photo {} ({} bytes)", photo.id, photo.len());
        }
        ShutterOutcome::RecordingStarted(started) => {
            info!("Recording {} for {:.1}s", started.format, duration);
            tokio::time::sleep(Duration::from_secs_f64(duration)).await;

            if let ShutterOutcome::ClipSaved(clip) = session.shutter().await? {
                info!("Saved clip {} ({} bytes)", clip.id, clip.len());
            }
        }
        ShutterOutcome::ClipSaved(_) => {
            warn!("Shutter stopped a recording that {} mode did not start", mode);
        }
    }
    Ok(())
}
