use std::collections::VecDeque;

use tracing::debug;

use crate::capture::{ArtifactId, CaptureArtifact};

/// Captured artifacts, newest first
///
/// Lives for the session only. Removing an entry drops the gallery's reference
/// to its payload; the bytes are freed once no snapshot still holds them.
#[derive(Debug, Default, Clone)]
pub struct Gallery {
    entries: VecDeque<CaptureArtifact>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact in front of every earlier one
    pub fn push(&mut self, artifact: CaptureArtifact) {
        debug!("Gallery: added {} {}", artifact.kind, artifact.id);
        self.entries.push_front(artifact);
    }

    /// Snapshot of every entry, newest first
    pub fn list(&self) -> Vec<CaptureArtifact> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptureArtifact> {
        self.entries.iter()
    }

    /// The most recent capture, for the preview thumbnail
    pub fn latest(&self) -> Option<&CaptureArtifact> {
        self.entries.front()
    }

    pub fn get(&self, id: ArtifactId) -> Option<&CaptureArtifact> {
        self.entries.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove an entry, releasing the gallery's hold on its payload
    pub fn remove(&mut self, id: ArtifactId) -> Option<CaptureArtifact> {
        let index = self.entries.iter().position(|a| a.id == id)?;
        let removed = self.entries.remove(index);
        debug!("Gallery: removed {}", id);
        removed
    }

    pub fn clear(&mut self) {
        debug!("Gallery: cleared {} entries", self.entries.len());
        self.entries.clear();
    }
}
