use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};

use crate::media::{MediaError, MediaSource, SourceKind};
use crate::remap::load_image;

#[derive(Debug, Clone)]
enum Frames {
    Memory(Vec<RgbImage>),
    /// Decoded on demand, in file-name order.
    Files(Vec<PathBuf>),
}

/// Finite, seekable video made of individual frames played at a fixed rate.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Frames,
    fps: f64,
    cursor: u64,
}

impl FrameSequence {
    pub fn from_frames(frames: Vec<RgbImage>, fps: f64) -> Self {
        FrameSequence {
            frames: Frames::Memory(frames),
            fps,
            cursor: 0,
        }
    }

    /// Every decodable image file directly inside `dir`, sorted by name.
    pub fn from_dir(dir: &Path, fps: f64) -> Result<Self, MediaError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| MediaError::Open(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && ImageFormat::from_path(path).is_ok())
            .collect();
        if files.is_empty() {
            return Err(MediaError::Open(format!(
                "{} contains no image frames",
                dir.display()
            )));
        }
        files.sort();

        Ok(FrameSequence {
            frames: Frames::Files(files),
            fps,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        match &self.frames {
            Frames::Memory(frames) => frames.len(),
            Frames::Files(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaSource for FrameSequence {
    fn kind(&self) -> SourceKind {
        SourceKind::VideoFile
    }

    fn read_next(&mut self) -> Result<Option<RgbImage>, MediaError> {
        let index = self.cursor as usize;
        let frame = match &self.frames {
            Frames::Memory(frames) => match frames.get(index) {
                Some(frame) => frame.clone(),
                None => return Ok(None),
            },
            Frames::Files(files) => match files.get(index) {
                Some(path) => load_image(&path.to_string_lossy())
                    .map_err(|e| MediaError::Read(e.to_string()))?,
                None => return Ok(None),
            },
        };
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn set_position(&mut self, index: u64) -> Result<(), MediaError> {
        self.cursor = index.min(self.len() as u64);
        Ok(())
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}
