use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::video::source::FacingMode;

/// What the shutter does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(CaptureMode::Photo),
            "video" => Ok(CaptureMode::Video),
            other => Err(format!("unknown capture mode '{}' (expected photo or video)", other)),
        }
    }
}

/// Everything the compositor and capture engine read each frame
///
/// The session controller is the only writer; everyone else sees copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub mode: CaptureMode,
    pub recording: bool,
    pub active_filter_index: usize,
    pub mirror_enabled: bool,
    /// Which camera is live; front cameras mirror
    pub facing: FacingMode,
}

impl SessionState {
    pub fn new(facing: FacingMode) -> Self {
        Self {
            mode: CaptureMode::Photo,
            recording: false,
            active_filter_index: 0,
            mirror_enabled: facing.mirrors(),
            facing,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(FacingMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_follows_facing() {
        let front = SessionState::new(FacingMode::User);
        assert!(front.mirror_enabled);
        assert_eq!(front.mode, CaptureMode::Photo);
        assert!(!front.recording);
        assert_eq!(front.active_filter_index, 0);

        assert!(!SessionState::new(FacingMode::Environment).mirror_enabled);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Video".parse::<CaptureMode>().unwrap(), CaptureMode::Video);
        assert_eq!("photo".parse::<CaptureMode>().unwrap(), CaptureMode::Photo);
        assert!("burst".parse::<CaptureMode>().is_err());
    }
}
