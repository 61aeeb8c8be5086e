//! Error types for Fushigi2D

use thiserror::Error;

/// Main error type for Fushigi2D
#[derive(Error, Debug)]
pub enum Fushigi2dError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Fushigi2dError {
    /// Errors the frame loop must not recover from
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Tracking(TrackingError::HelperFailed(_)))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Avatar rig and asset errors. All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Assets directory not found: {0}")]
    AssetsDirNotFound(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("No sprite mapped for layer: {0}")]
    UnmappedSprite(String),

    #[error("Unknown sprite key: {0}")]
    UnknownSprite(String),
}

/// Tracker-side errors (MediaPipe receiver, replay files, helper subprocess)
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("MediaPipe receiver error: {0}")]
    MpReceiver(String),

    #[error("MediaPipe parse error: {0}")]
    MpParse(String),

    #[error("MediaPipe subprocess error: {0}")]
    MpSubprocess(String),

    #[error("Replay error: {0}")]
    Replay(String),

    /// The helper could not capture (camera failed to open, process died)
    #[error("Tracker helper failed: {0}")]
    HelperFailed(String),
}

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Canvas size must be non-zero, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },

    #[error("Failed to save frame: {0}")]
    Snapshot(String),
}

/// Result type alias for Fushigi2D operations
pub type Result<T> = std::result::Result<T, Fushigi2dError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_helper_failure_is_fatal() {
        let fatal: Fushigi2dError = TrackingError::HelperFailed("camera 9".into()).into();
        assert!(fatal.is_fatal());
        assert_eq!(
            fatal.to_string(),
            "Tracking error: Tracker helper failed: camera 9"
        );

        let transient: Fushigi2dError = TrackingError::MpReceiver("Receive error".into()).into();
        assert!(!transient.is_fatal());
        assert!(!Fushigi2dError::from(std::io::Error::new(std::io::ErrorKind::Other, "x")).is_fatal());
    }
}
