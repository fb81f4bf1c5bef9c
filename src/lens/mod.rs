//! Lens-model capability: projection parameters in, remap tables out.
//!
//! A [`LensModel`] is built for one calibration and turns anypoint or
//! panorama parameters into a pair of [`RemapTables`]. Each table entry holds
//! the fisheye source coordinate sampled by the corresponding output pixel.
//! Entries that have no valid source are negative.

use nalgebra::DMatrix;

use crate::camera::{CameraModelError, Resolution};

pub mod camera_lens;

pub use camera_lens::CameraLens;

#[derive(thiserror::Error, Debug)]
pub enum LensError {
    #[error("Invalid projection parameter: {0}")]
    InvalidParameter(String),
    #[error("Remap tables differ in shape: map_x is {x}, map_y is {y}")]
    ShapeMismatch { x: Resolution, y: Resolution },
    #[error("Calibration error: {0}")]
    Camera(#[from] CameraModelError),
}

/// Marker value for table entries with no valid source pixel.
pub const INVALID_COORDINATE: f32 = -1.0;

/// Per-output-pixel source coordinates.
///
/// Both tables have `height` rows and `width` columns. The pair can only be
/// built with matching shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct RemapTables {
    map_x: DMatrix<f32>,
    map_y: DMatrix<f32>,
}

impl RemapTables {
    pub fn new(map_x: DMatrix<f32>, map_y: DMatrix<f32>) -> Result<Self, LensError> {
        if map_x.shape() != map_y.shape() {
            return Err(LensError::ShapeMismatch {
                x: Resolution::new(map_x.ncols() as u32, map_x.nrows() as u32),
                y: Resolution::new(map_y.ncols() as u32, map_y.nrows() as u32),
            });
        }
        Ok(RemapTables { map_x, map_y })
    }

    pub fn map_x(&self) -> &DMatrix<f32> {
        &self.map_x
    }

    pub fn map_y(&self) -> &DMatrix<f32> {
        &self.map_y
    }

    pub fn width(&self) -> u32 {
        self.map_x.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.map_x.nrows() as u32
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Source coordinate for output pixel `(col, row)`, or `None` when the
    /// entry is invalid or out of range.
    pub fn source(&self, col: u32, row: u32) -> Option<(f32, f32)> {
        let (row, col) = (row as usize, col as usize);
        if row >= self.map_x.nrows() || col >= self.map_x.ncols() {
            return None;
        }
        let x = self.map_x[(row, col)];
        let y = self.map_y[(row, col)];
        if x < 0.0 || y < 0.0 || !x.is_finite() || !y.is_finite() {
            return None;
        }
        Some((x, y))
    }

    /// Output pixels along the table border, walked clockwise from the
    /// top-left corner: top row, right column, bottom row, left column.
    pub fn border(&self) -> Vec<(u32, u32)> {
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let mut pixels = Vec::with_capacity(2 * (w + h) as usize);
        pixels.extend((0..w).map(|col| (col, 0)));
        pixels.extend((1..h).map(|row| (w - 1, row)));
        if h > 1 {
            pixels.extend((0..w.saturating_sub(1)).rev().map(|col| (col, h - 1)));
        }
        if w > 1 {
            pixels.extend((1..h.saturating_sub(1)).rev().map(|row| (0, row)));
        }
        pixels
    }
}

/// The external lens-model capability.
///
/// Implementations are constructed for one calibration and must be
/// deterministic: the same arguments always yield the same tables.
pub trait LensModel {
    /// Identity of the calibration this lens was built from.
    fn calibration_id(&self) -> &str;

    /// Steerable rectilinear view, sub-mode 1 (`alpha` tilt towards azimuth `beta`).
    fn anypoint(
        &self,
        alpha: f64,
        beta: f64,
        zoom: f64,
        submode: u8,
        output: Resolution,
    ) -> Result<RemapTables, LensError>;

    /// Steerable rectilinear view, sub-mode 2 (pitch `alpha`, yaw `beta`, `roll`).
    fn anypoint_car(
        &self,
        alpha: f64,
        beta: f64,
        roll: f64,
        zoom: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError>;

    /// Cylindrical unwrap between polar angles `alpha_min` and `alpha_max`.
    fn panorama(
        &self,
        alpha_min: f64,
        alpha_max: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError>;
}
