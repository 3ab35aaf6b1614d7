use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::capture::format::ClipFormat;

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle to a captured artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(u64);

impl ArtifactId {
    /// A process-unique id
    pub fn next() -> Self {
        Self(NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Clip,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Clip => write!(f, "clip"),
        }
    }
}

/// Encoded bytes of an artifact
///
/// Shared, so gallery snapshots are cheap. The bytes are freed once the last
/// snapshot holding them is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPayload {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
    pub extension: String,
}

/// A finished still or clip
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub payload: ArtifactPayload,
    pub created_at: DateTime<Local>,
}

impl CaptureArtifact {
    fn new(kind: ArtifactKind, bytes: Vec<u8>, mime_type: &str, extension: &str) -> Self {
        Self {
            id: ArtifactId::next(),
            kind,
            payload: ArtifactPayload {
                bytes: bytes.into(),
                mime_type: mime_type.to_string(),
                extension: extension.to_string(),
            },
            created_at: Local::now(),
        }
    }

    /// A JPEG still
    pub fn image(bytes: Vec<u8>) -> Self {
        Self::new(ArtifactKind::Image, bytes, "image/jpeg", "jpg")
    }

    /// A recorded clip in `format`; may be empty
    pub fn clip(bytes: Vec<u8>, format: ClipFormat) -> Self {
        Self::new(ArtifactKind::Clip, bytes, format.mime_type(), format.extension())
    }

    /// The renderable handle UI code refers to this artifact by
    pub fn handle(&self) -> ArtifactId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload.bytes
    }

    pub fn len(&self) -> usize {
        self.payload.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.bytes.is_empty()
    }

    /// `<app>_<unix millis>.<ext>`
    pub fn suggested_filename(&self, app_name: &str) -> String {
        format!(
            "{}_{}.{}",
            app_name,
            self.created_at.timestamp_millis(),
            self.payload.extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let a = CaptureArtifact::image(vec![1]);
        let b = CaptureArtifact::image(vec![2]);
        assert!(b.id > a.id);
        assert_eq!(a.handle(), a.id);
    }

    #[test]
    fn test_suggested_filenames() {
        let still = CaptureArtifact::image(vec![0xFF, 0xD8]);
        let name = still.suggested_filename("lumina");
        assert!(name.starts_with("lumina_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(
            name,
            format!("lumina_{}.jpg", still.created_at.timestamp_millis())
        );

        let clip = CaptureArtifact::clip(Vec::new(), ClipFormat::WebmVp8);
        assert!(clip.is_empty());
        assert_eq!(clip.kind, ArtifactKind::Clip);
        assert_eq!(clip.payload.mime_type, "video/webm;codecs=vp8");
        assert!(clip.suggested_filename("lumina").ends_with(".webm"));
    }

    #[test]
    fn test_clones_share_payload() {
        let still = CaptureArtifact::image(vec![7; 1024]);
        let copy = still.clone();
        assert!(Arc::ptr_eq(&still.payload.bytes, &copy.payload.bytes));
        assert_eq!(Arc::strong_count(&still.payload.bytes), 2);
    }
}
