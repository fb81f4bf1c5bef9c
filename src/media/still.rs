use std::path::Path;

use image::RgbImage;

use crate::media::{MediaError, MediaSource, SourceKind};
use crate::remap::load_image;

/// A single image presented as a source that never runs out.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    image: RgbImage,
}

impl StillImageSource {
    pub fn new(image: RgbImage) -> Self {
        StillImageSource { image }
    }

    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let image = load_image(&path.to_string_lossy())
            .map_err(|e| MediaError::Open(e.to_string()))?;
        Ok(StillImageSource::new(image))
    }
}

impl MediaSource for StillImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::StillImage
    }

    fn read_next(&mut self) -> Result<Option<RgbImage>, MediaError> {
        Ok(Some(self.image.clone()))
    }

    fn position(&self) -> u64 {
        0
    }

    fn set_position(&mut self, _index: u64) -> Result<(), MediaError> {
        Ok(())
    }

    fn fps(&self) -> Option<f64> {
        None
    }

    fn frame_count(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::synthetic_frame;

    #[test]
    fn test_still_image_repeats() {
        let frame = synthetic_frame(6, 4, 9);
        let mut source = StillImageSource::new(frame.clone());
        source.set_position(12).unwrap();
        assert_eq!(source.position(), 0);
        assert_eq!(source.read_next().unwrap(), Some(frame.clone()));
        assert_eq!(source.read_next().unwrap(), Some(frame));
        assert_eq!(source.frame_count(), None);
    }

    #[test]
    fn test_open_missing_image() {
        assert!(matches!(
            StillImageSource::open(Path::new("samples/nope.png")),
            Err(MediaError::Open(_))
        ));
    }
}
