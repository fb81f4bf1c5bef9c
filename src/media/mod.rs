//! Media capability: frame sources and how they are opened.
//!
//! A [`MediaSource`] yields decoded frames one at a time and exposes a frame
//! cursor for seekable sources. A [`MediaBackend`] turns a [`SourceSpec`] into
//! a source; [`FileBackend`] covers still images and image-sequence videos,
//! other decoders plug in through the same trait.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::info;
use serde::{Deserialize, Serialize};

pub mod sequence;
pub mod still;

pub use sequence::FrameSequence;
pub use still::StillImageSource;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Cannot open source: {0}")]
    Open(String),
    #[error("Cannot read frame: {0}")]
    Read(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    StillImage,
    VideoFile,
    LiveCamera,
}

/// What to open: a file or directory on disk, or a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    File(PathBuf),
    Camera(String),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File(path) => write!(f, "{}", path.display()),
            SourceSpec::Camera(device) => write!(f, "camera {device}"),
        }
    }
}

pub trait MediaSource {
    fn kind(&self) -> SourceKind;

    /// Decode the frame at the cursor and advance it. `Ok(None)` means the
    /// end of the stream was reached.
    fn read_next(&mut self) -> Result<Option<RgbImage>, MediaError>;

    /// Index of the frame the next `read_next` returns. Always 0 for still
    /// images and live cameras.
    fn position(&self) -> u64;

    fn set_position(&mut self, index: u64) -> Result<(), MediaError>;

    fn fps(&self) -> Option<f64>;

    /// Known only for finite video.
    fn frame_count(&self) -> Option<u64>;
}

pub trait MediaBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn MediaSource>, MediaError>;
}

/// Opens image files as still images and directories as frame sequences.
#[derive(Debug, Clone)]
pub struct FileBackend {
    sequence_fps: f64,
}

impl FileBackend {
    pub fn new(sequence_fps: f64) -> Self {
        FileBackend { sequence_fps }
    }

    fn open_path(&self, path: &Path) -> Result<Box<dyn MediaSource>, MediaError> {
        if path.is_dir() {
            let sequence = FrameSequence::from_dir(path, self.sequence_fps)?;
            info!(
                "Opened image sequence {} ({} frames at {} fps)",
                path.display(),
                sequence.len(),
                self.sequence_fps
            );
            return Ok(Box::new(sequence));
        }
        if !path.exists() {
            return Err(MediaError::Open(format!(
                "{} does not exist",
                path.display()
            )));
        }
        if ImageFormat::from_path(path).is_err() {
            return Err(MediaError::Open(format!(
                "{} is not a supported image format and no video decoder is available",
                path.display()
            )));
        }

        let still = StillImageSource::open(path)?;
        info!("Opened still image {}", path.display());
        Ok(Box::new(still))
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        FileBackend::new(30.0)
    }
}

impl MediaBackend for FileBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn MediaSource>, MediaError> {
        match spec {
            SourceSpec::File(path) => self.open_path(path),
            SourceSpec::Camera(device) => Err(MediaError::Open(format!(
                "no capture driver for camera {device}"
            ))),
        }
    }
}
