//! Engine-level error type.
//!
//! Every variant except [`ViewError::Io`] and [`ViewError::Config`] is
//! recoverable: the engine keeps its last good state and carries on.

use crate::camera::CameraModelError;
use crate::lens::LensError;
use crate::media::MediaError;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// The lens model rejected a parameter combination.
    #[error("Invalid projection parameter: {0}")]
    InvalidProjectionParameter(String),
    /// A frame could not be decoded, or the source went away.
    #[error("Media read error: {0}")]
    MediaRead(String),
    #[error("Media open error: {0}")]
    MediaOpen(String),
    /// Calibration or camera-type selection failed; the previous calibration stays.
    #[error("Configuration error (recoverable): {0}")]
    RecoverableConfig(String),
    #[error("No media source is open")]
    NoSource,
    /// Viewer configuration file is unreadable or malformed.
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewError {
    /// Boundary failures that must be reported up rather than absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ViewError::Io(_) | ViewError::Config(_))
    }
}

impl From<LensError> for ViewError {
    fn from(err: LensError) -> Self {
        match err {
            LensError::InvalidParameter(msg) => ViewError::InvalidProjectionParameter(msg),
            other => ViewError::RecoverableConfig(other.to_string()),
        }
    }
}

impl From<MediaError> for ViewError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Open(msg) => ViewError::MediaOpen(msg),
            MediaError::Read(msg) => ViewError::MediaRead(msg),
        }
    }
}

impl From<CameraModelError> for ViewError {
    fn from(err: CameraModelError) -> Self {
        ViewError::RecoverableConfig(err.to_string())
    }
}
