use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::{
    audio::AudioSpec,
    capture::{
        encoder::{ClipEncoder, EncoderBackend, EncoderRequest, FramePush},
        format::ClipFormat,
    },
    error::{CaptureError, Result},
    video::types::Frame,
};

/// Frames queued for the writer thread before `push_video` starts dropping
const WRITER_QUEUE_DEPTH: usize = 4;

/// How long ffmpeg gets to flush the video once stdin is closed
const FINISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tail of ffmpeg's stderr kept for error messages
const STDERR_TAIL: usize = 4096;

/// Size of the chunks a finished clip is read back in
const READ_CHUNK_SIZE: usize = 256 * 1024;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

fn encoding_failed(reason: impl Into<String>) -> CaptureError {
    CaptureError::EncodingFailed {
        reason: reason.into(),
    }
}

/// Encodes clips by piping raw frames into the ffmpeg command line tool
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: PathBuf,
    formats: Vec<ClipFormat>,
}

impl FfmpegBackend {
    /// Probe `binary`; `None` when it is missing or has none of the encoders we need
    pub fn detect<P: AsRef<Path>>(binary: P) -> Option<Self> {
        let binary = binary.as_ref().to_path_buf();

        let version = Command::new(&binary)
            .args(["-hide_banner", "-version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if !matches!(version, Ok(status) if status.success()) {
            debug!("ffmpeg not available at {:?}", binary);
            return None;
        }

        let output = Command::new(&binary)
            .args(["-hide_banner", "-encoders"])
            .stderr(Stdio::null())
            .output()
            .ok()?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let formats = formats_from_encoder_listing(&listing);
        if formats.is_empty() {
            warn!("ffmpeg at {:?} has no usable video encoders", binary);
            return None;
        }

        info!("Using ffmpeg at {:?} ({} clip formats)", binary, formats.len());
        Some(Self { binary, formats })
    }

    pub fn formats(&self) -> &[ClipFormat] {
        &self.formats
    }
}

/// Clip formats an `ffmpeg -encoders` listing can produce, best first
fn formats_from_encoder_listing(listing: &str) -> Vec<ClipFormat> {
    let encoders: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .collect();
    let has = |name: &str| encoders.iter().any(|e| *e == name);

    let mut formats = Vec::new();
    if has("libvpx-vp9") {
        formats.push(ClipFormat::WebmVp9);
    }
    if has("libvpx") {
        formats.push(ClipFormat::WebmVp8);
    }
    if has("mjpeg") {
        formats.push(ClipFormat::MotionJpeg);
    }
    formats
}

fn codec_args(format: ClipFormat) -> &'static [&'static str] {
    match format {
        ClipFormat::WebmVp9 => &[
            "-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32", "-deadline", "realtime", "-cpu-used", "8",
            "-pix_fmt", "yuv420p", "-f", "webm",
        ],
        ClipFormat::WebmVp8 => &[
            "-c:v", "libvpx", "-b:v", "2M", "-deadline", "realtime", "-cpu-used", "8", "-pix_fmt",
            "yuv420p", "-f", "webm",
        ],
        ClipFormat::MotionJpeg => &["-c:v", "mjpeg", "-q:v", "3", "-pix_fmt", "yuvj420p", "-f", "mjpeg"],
    }
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, format: ClipFormat) -> bool {
        self.formats.contains(&format)
    }

    fn native_format(&self) -> ClipFormat {
        self.formats.first().copied().unwrap_or(ClipFormat::MotionJpeg)
    }

    fn open(&self, request: EncoderRequest) -> Result<Box<dyn ClipEncoder>> {
        if !self.supports(request.format) {
            return Err(CaptureError::UnsupportedFormat {
                mime: request.format.mime_type().to_string(),
            }
            .into());
        }
        Ok(Box::new(FfmpegEncoder::spawn(&self.binary, request)?))
    }
}

enum WriterMessage {
    Frame(Vec<u8>),
    Stop,
}

/// One running ffmpeg process
///
/// Video goes to a temporary file while recording; audio is spooled to a
/// float WAV next to it and muxed in when the recording finishes.
struct FfmpegEncoder {
    binary: PathBuf,
    request: EncoderRequest,
    work_dir: PathBuf,
    video_path: PathBuf,
    audio: Option<AudioSpool>,
    writer_tx: Option<SyncSender<WriterMessage>>,
    writer_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<String>>,
    process: Option<Child>,
    finish_timeout: Duration,
}

struct AudioSpool {
    path: PathBuf,
    writer: hound::WavWriter<BufWriter<File>>,
}

impl FfmpegEncoder {
    fn spawn(binary: &Path, request: EncoderRequest) -> Result<Self> {
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let work_dir = std::env::temp_dir().join(format!("lumina-rec-{}-{}", std::process::id(), session));
        fs::create_dir_all(&work_dir)?;

        let video_path = work_dir.join(format!("video.{}", request.format.extension()));
        let size = format!("{}x{}", request.width, request.height);
        let fps = request.fps.to_string();

        let mut process = Command::new(binary)
            .args([
                "-y", "-hide_banner", "-loglevel", "error", "-nostats", "-f", "rawvideo", "-pix_fmt", "rgb24",
                "-s", &size, "-r", &fps, "-i", "pipe:0",
            ])
            .args(codec_args(request.format))
            .arg(&video_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| encoding_failed(format!("Failed to spawn ffmpeg: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| encoding_failed("Failed to open ffmpeg stdin"))?;

        let stderr = process
            .stderr
            .take()
            .ok_or_else(|| encoding_failed("Failed to open ffmpeg stderr"))?;

        let (writer_tx, writer_rx) = mpsc::sync_channel(WRITER_QUEUE_DEPTH);
        let writer_thread = thread::Builder::new()
            .name("lumina-ffmpeg-writer".to_string())
            .spawn(move || writer_thread_fn(stdin, writer_rx))?;
        let stderr_thread = thread::Builder::new()
            .name("lumina-ffmpeg-stderr".to_string())
            .spawn(move || stderr_thread_fn(stderr))?;

        let audio = match request.audio {
            Some(spec) if request.format.carries_audio() => Some(AudioSpool::create(&work_dir, spec)?),
            _ => None,
        };

        debug!(
            "ffmpeg recording {} at {} {}fps into {:?}",
            request.format, size, fps, work_dir
        );

        Ok(Self {
            binary: binary.to_path_buf(),
            request,
            work_dir,
            video_path,
            audio,
            writer_tx: Some(writer_tx),
            writer_thread: Some(writer_thread),
            stderr_thread: Some(stderr_thread),
            process: Some(process),
            finish_timeout: FINISH_TIMEOUT,
        })
    }

    /// Close stdin and wait for ffmpeg to finish writing the video file
    ///
    /// An ffmpeg that has not exited within `finish_timeout` is killed, which
    /// also unblocks a writer stuck on a full pipe.
    fn close_video(&mut self) -> Result<()> {
        if let Some(tx) = self.writer_tx.take() {
            // Queued frames are still written; a full queue just ends the stream sooner
            let _ = tx.try_send(WriterMessage::Stop);
        }

        let Some(mut process) = self.process.take() else {
            self.join_threads();
            return Ok(());
        };

        let deadline = Instant::now() + self.finish_timeout;
        let status = loop {
            match process.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) if Instant::now() >= deadline => {
                    warn!("ffmpeg did not finish within {:?}, killing it", self.finish_timeout);
                    let _ = process.kill();
                    let _ = process.wait();
                    break None;
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(e) => {
                    let _ = process.kill();
                    let _ = process.wait();
                    self.join_threads();
                    return Err(encoding_failed(format!("ffmpeg execution failed: {}", e)).into());
                }
            }
        };

        let stderr = self.join_threads();
        match status {
            Some(status) if status.success() => Ok(()),
            Some(_) => Err(encoding_failed(format!("ffmpeg failed: {}", stderr.trim())).into()),
            None => Err(encoding_failed("ffmpeg timed out").into()),
        }
    }

    /// Wait for the writer and stderr threads; returns the stderr tail
    fn join_threads(&mut self) -> String {
        if let Some(handle) = self.writer_thread.take() {
            if handle.join().is_err() {
                error!("ffmpeg writer thread panicked");
            }
        }
        self.stderr_thread
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Mux the spooled audio into the recorded video
    fn mux_audio(&self, audio_path: &Path) -> Result<PathBuf> {
        let muxed_path = self
            .work_dir
            .join(format!("clip.{}", self.request.format.extension()));

        let output = Command::new(&self.binary)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(&self.video_path)
            .arg("-i")
            .arg(audio_path)
            .args(["-c:v", "copy", "-c:a", "libopus", "-shortest", "-f", "webm"])
            .arg(&muxed_path)
            .output()
            .map_err(|e| encoding_failed(format!("Failed to spawn ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(encoding_failed(format!("ffmpeg mux failed: {}", stderr.trim())).into());
        }
        Ok(muxed_path)
    }
}

impl AudioSpool {
    fn create(dir: &Path, spec: AudioSpec) -> Result<Self> {
        let path = dir.join("audio.wav");
        let wav_spec = hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(&path, wav_spec)
            .map_err(|e| encoding_failed(format!("Failed to create audio spool: {}", e)))?;
        Ok(Self { path, writer })
    }
}

fn writer_thread_fn(mut stdin: ChildStdin, frames: Receiver<WriterMessage>) {
    while let Ok(message) = frames.recv() {
        match message {
            WriterMessage::Frame(bytes) => {
                if let Err(e) = stdin.write_all(&bytes) {
                    error!("Recording: failed to write frame to ffmpeg: {}", e);
                    break;
                }
            }
            WriterMessage::Stop => break,
        }
    }
    // stdin drops here, which tells ffmpeg the stream ended
}

/// Read stderr until ffmpeg exits so a chatty process never fills the pipe
fn stderr_thread_fn(mut stderr: impl Read) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stderr.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL {
                    tail.drain(..tail.len() - STDERR_TAIL);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

fn read_chunks(path: &Path) -> Result<Vec<Vec<u8>>> {
    let mut file = File::open(path)?;
    let mut chunks = Vec::new();
    loop {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        chunk.truncate(read);
        chunks.push(chunk);
    }
    Ok(chunks)
}

impl ClipEncoder for FfmpegEncoder {
    fn muxes_audio(&self) -> bool {
        self.audio.is_some()
    }

    fn push_video(&mut self, frame: &Frame) -> Result<FramePush> {
        if frame.dimensions() != (self.request.width, self.request.height) {
            return Err(encoding_failed(format!(
                "frame is {}x{}, recording is {}x{}",
                frame.width(),
                frame.height(),
                self.request.width,
                self.request.height
            ))
            .into());
        }
        let tx = self
            .writer_tx
            .as_ref()
            .ok_or_else(|| encoding_failed("recording already finished"))?;
        match tx.try_send(WriterMessage::Frame(frame.as_raw().to_vec())) {
            Ok(()) => Ok(FramePush::Queued),
            Err(TrySendError::Full(_)) => Ok(FramePush::Dropped),
            Err(TrySendError::Disconnected(_)) => Err(encoding_failed("ffmpeg writer stopped").into()),
        }
    }

    fn push_audio(&mut self, samples: &[f32]) -> Result<()> {
        let Some(spool) = self.audio.as_mut() else {
            return Ok(());
        };
        for &sample in samples {
            spool
                .writer
                .write_sample(sample)
                .map_err(|e| encoding_failed(format!("Failed to spool audio: {}", e)))?;
        }
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Vec<u8>> {
        // ffmpeg writes a seekable container; bytes are only final once it exits
        Vec::new()
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<Vec<u8>>> {
        self.close_video()?;

        let clip_path = match self.audio.take() {
            Some(spool) => {
                spool
                    .writer
                    .finalize()
                    .map_err(|e| encoding_failed(format!("Failed to finalize audio: {}", e)))?;
                match self.mux_audio(&spool.path) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Audio mux failed, keeping video only: {}", e);
                        self.video_path.clone()
                    }
                }
            }
            None => self.video_path.clone(),
        };

        let chunks = read_chunks(&clip_path)?;
        debug!("ffmpeg clip ready: {} chunks from {:?}", chunks.len(), clip_path);
        Ok(chunks)
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.writer_tx.take();
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
        self.join_threads();
        if let Err(e) = fs::remove_dir_all(&self.work_dir) {
            debug!("Could not remove {:?}: {}", self.work_dir, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Encoders:
 V..... = Video
 ------
 V....D libvpx               libvpx VP8 (codec vp8)
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 VFS..D mjpeg                MJPEG (Motion JPEG)
 A....D libopus              libopus Opus (codec opus)
";

    #[test]
    fn test_encoder_listing_parsing() {
        assert_eq!(
            formats_from_encoder_listing(LISTING),
            vec![ClipFormat::WebmVp9, ClipFormat::WebmVp8, ClipFormat::MotionJpeg]
        );

        let vp8_only = " V....D libvpx               libvpx VP8\n";
        assert_eq!(formats_from_encoder_listing(vp8_only), vec![ClipFormat::WebmVp8]);
        assert!(formats_from_encoder_listing("").is_empty());
    }

    #[test]
    fn test_missing_binary_is_not_detected() {
        assert!(FfmpegBackend::detect("/nonexistent/lumina-ffmpeg").is_none());
    }

    #[test]
    fn test_backend_prefers_vp9() {
        let backend = FfmpegBackend {
            binary: PathBuf::from("ffmpeg"),
            formats: formats_from_encoder_listing(LISTING),
        };
        assert_eq!(backend.native_format(), ClipFormat::WebmVp9);
        assert!(backend.supports(ClipFormat::WebmVp8));
    }

    /// A stand-in for ffmpeg that never reads its stdin
    #[cfg(unix)]
    fn stalled_binary(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("stalled-ffmpeg");
        fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn rgb_request(width: u32, height: u32) -> EncoderRequest {
        EncoderRequest {
            format: ClipFormat::WebmVp8,
            width,
            height,
            fps: 30,
            audio: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_stalled_ffmpeg_drops_frames_instead_of_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let binary = stalled_binary(dir.path());
        let mut encoder = FfmpegEncoder::spawn(&binary, rgb_request(64, 64)).unwrap();
        encoder.finish_timeout = Duration::from_millis(200);

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let frame = Frame::new_filled(64, 64, [40, 80, 120]);
            let mut dropped = 0;
            for _ in 0..40 {
                if encoder.push_video(&frame).unwrap() == FramePush::Dropped {
                    dropped += 1;
                }
            }
            let finished = Box::new(encoder).finish();
            let _ = done_tx.send((dropped, finished.is_err()));
        });

        let (dropped, finish_failed) = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("pushing to a stalled ffmpeg blocked");
        assert!(dropped > 0);
        assert!(finish_failed);
    }
}
