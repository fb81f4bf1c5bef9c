//! Per-frame image production.
//!
//! [`FrameProcessor`] turns one decoded fisheye frame into the three images
//! the display shows: the untouched original, the original with the sampled
//! region outlined, and the projected result.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::lens::RemapTables;
use crate::projection::ViewMode;
use crate::remap::{draw_polygon, remap};

/// Colour and line thickness of the projection-boundary outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub color: [u8; 3],
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        OverlayStyle {
            color: [0, 255, 0],
            thickness: 2,
        }
    }
}

/// The images produced for one displayed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBundle {
    pub original: RgbImage,
    pub drawing: RgbImage,
    pub result: RgbImage,
}

impl FrameBundle {
    /// A bundle where every image is a copy of `original`.
    pub fn passthrough(original: &RgbImage) -> Self {
        FrameBundle {
            original: original.clone(),
            drawing: original.clone(),
            result: original.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameProcessor {
    overlay: OverlayStyle,
}

impl FrameProcessor {
    pub fn new(overlay: OverlayStyle) -> Self {
        FrameProcessor { overlay }
    }

    pub fn overlay(&self) -> &OverlayStyle {
        &self.overlay
    }

    /// Build the bundle for `original`.
    ///
    /// In fisheye mode, or when no tables are available, all three images are
    /// copies of the input. Otherwise the result is resampled through
    /// `tables` and the drawing carries the boundary outline. The input is
    /// never modified.
    pub fn process(
        &self,
        original: &RgbImage,
        mode: ViewMode,
        tables: Option<&RemapTables>,
    ) -> FrameBundle {
        match (mode, tables) {
            (ViewMode::Fisheye, _) | (_, None) => FrameBundle::passthrough(original),
            (_, Some(tables)) => FrameBundle {
                original: original.clone(),
                drawing: draw_polygon(original, tables, &self.overlay),
                result: remap(original, tables),
            },
        }
    }
}
