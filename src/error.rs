use std::fmt;

use thiserror::Error;

/// Main error type for the Lumina library
#[derive(Error, Debug)]
pub enum LuminaError {
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Filter catalog and effect expression errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Filter index {index} out of range (catalog has {len} presets)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid effect expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Filter not found: {name}")]
    UnknownFilter { name: String },

    #[error("Duplicate filter name: {name}")]
    DuplicateName { name: String },
}

/// Camera/microphone source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Could not acquire {facing} source: {reason}")]
    Acquisition { facing: String, reason: String },

    #[error("Failed to load source file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported source format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid source parameters: {details}")]
    InvalidParameters { details: String },
}

/// Still capture and clip recording errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Output surface has no rendered frame to capture")]
    EmptySurface,

    #[error("Cannot {action} while {state}")]
    InvalidStateTransition { state: String, action: String },

    #[error("Clip encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Unsupported clip format: {mime}")]
    UnsupportedFormat { mime: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Non-fatal conditions reported when a recording starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureWarning {
    /// The source provider supplied no audio track; the clip is video-only
    NoAudioTrack,
    /// An audio track exists but the negotiated format cannot carry it
    AudioNotMuxed { format: String },
}

impl fmt::Display for CaptureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAudioTrack => write!(f, "no audio track available, recording video only"),
            Self::AudioNotMuxed { format } => {
                write!(f, "{} cannot carry audio, recording video only", format)
            }
        }
    }
}

/// Convenience type alias for Results using LuminaError
pub type Result<T> = std::result::Result<T, LuminaError>;

impl LuminaError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            // The user can render a frame and press the shutter again
            Self::Capture(CaptureError::EmptySurface) => true,
            Self::Capture(CaptureError::InvalidStateTransition { .. }) => true,
            // Acquisition is a blocking notice with no automatic retry
            Self::Source(SourceError::Acquisition { .. }) => false,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Source(SourceError::Acquisition { .. }) => {
                "Could not access camera. Please allow permissions.".to_string()
            }
            Self::Source(SourceError::LoadFailed { path }) => {
                format!("Could not load '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Filter(FilterError::UnknownFilter { name }) => {
                format!("Filter '{}' not found. Run with --list-filters to see the catalog.", name)
            }
            Self::Capture(CaptureError::EmptySurface) => {
                "Nothing to capture yet, the viewfinder has not shown a frame.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_is_blocking_notice() {
        let err: LuminaError = SourceError::Acquisition {
            facing: "user".to_string(),
            reason: "permission denied".to_string(),
        }
        .into();

        assert!(!err.is_recoverable());
        assert_eq!(err.user_message(), "Could not access camera. Please allow permissions.");
    }

    #[test]
    fn test_state_transition_message() {
        let err = CaptureError::InvalidStateTransition {
            state: "idle".to_string(),
            action: "stop recording".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot stop recording while idle");
    }

    #[test]
    fn test_warning_display() {
        let warning = CaptureWarning::AudioNotMuxed { format: "video/x-motion-jpeg".to_string() };
        assert!(warning.to_string().contains("video/x-motion-jpeg"));
    }
}
