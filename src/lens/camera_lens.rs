//! Lens model backed by a fisheye [`CameraModel`].
//!
//! Every output pixel of a projected view is a ray from a virtual camera. The
//! ray is rotated into the fisheye camera frame and projected through the
//! calibration, which gives the source coordinate stored in the remap tables.

use log::debug;
use nalgebra::{DMatrix, Rotation3, Vector3};

use crate::camera::{load_camera_model, CameraModel, CameraModelError, CameraType, Resolution};
use crate::lens::{LensError, LensModel, RemapTables, INVALID_COORDINATE};

/// [`LensModel`] computing tables by ray casting through a calibration.
#[derive(Debug)]
pub struct CameraLens {
    id: String,
    model: Box<dyn CameraModel>,
}

impl CameraLens {
    pub fn new(id: impl Into<String>, model: Box<dyn CameraModel>) -> Result<Self, LensError> {
        model.validate_params()?;
        if model.get_resolution().is_empty() {
            return Err(LensError::Camera(CameraModelError::InvalidParams(
                "calibration resolution must be non-zero".to_string(),
            )));
        }
        Ok(CameraLens {
            id: id.into(),
            model,
        })
    }

    /// Loads a calibration file and wraps it. The calibration identity is
    /// `"<camera type>:<path>"`.
    pub fn from_yaml(camera_type: CameraType, path: &str) -> Result<Self, LensError> {
        let model = load_camera_model(camera_type, path)?;
        CameraLens::new(format!("{camera_type}:{path}"), model)
    }

    pub fn model(&self) -> &dyn CameraModel {
        self.model.as_ref()
    }

    /// Builds tables of size `output` by projecting `ray(col, row)` for each pixel.
    ///
    /// Projected coordinates are rescaled from the calibration resolution to
    /// `output`, so a calibration made at one size applies to frames of another.
    fn build_tables<F>(&self, output: Resolution, ray: F) -> Result<RemapTables, LensError>
    where
        F: Fn(u32, u32) -> Vector3<f64>,
    {
        let calibrated = self.model.get_resolution();
        let scale_x = output.width as f64 / calibrated.width as f64;
        let scale_y = output.height as f64 / calibrated.height as f64;
        let (w, h) = (output.width as usize, output.height as usize);

        let mut map_x = DMatrix::from_element(h, w, INVALID_COORDINATE);
        let mut map_y = DMatrix::from_element(h, w, INVALID_COORDINATE);
        let mut valid = 0usize;

        for row in 0..h {
            for col in 0..w {
                let Ok(p) = self.model.project(&ray(col as u32, row as u32)) else {
                    continue;
                };
                let (u, v) = (p.x * scale_x, p.y * scale_y);
                if u < 0.0 || v < 0.0 || u > (output.width - 1) as f64 || v > (output.height - 1) as f64 {
                    continue;
                }
                map_x[(row, col)] = u as f32;
                map_y[(row, col)] = v as f32;
                valid += 1;
            }
        }

        debug!(
            "{}: built {output} remap tables, {valid} of {} pixels sample the fisheye image",
            self.id,
            w * h
        );
        RemapTables::new(map_x, map_y)
    }

    /// Virtual pinhole ray through output pixel `(col, row)` for a view of
    /// size `output` with focal length `zoom * width / 4`.
    fn pinhole_ray(col: u32, row: u32, output: Resolution, zoom: f64) -> Vector3<f64> {
        let focal = zoom * output.width as f64 / 4.0;
        let x = (col as f64 + 0.5 - output.width as f64 / 2.0) / focal;
        let y = (row as f64 + 0.5 - output.height as f64 / 2.0) / focal;
        Vector3::new(x, y, 1.0)
    }
}

fn check_finite(values: &[(&str, f64)]) -> Result<(), LensError> {
    for (name, value) in values {
        if !value.is_finite() {
            return Err(LensError::InvalidParameter(format!(
                "{name} must be finite, got {value}"
            )));
        }
    }
    Ok(())
}

fn check_zoom(zoom: f64) -> Result<(), LensError> {
    if zoom <= 0.0 {
        return Err(LensError::InvalidParameter(format!(
            "zoom must be positive, got {zoom}"
        )));
    }
    Ok(())
}

fn check_output(output: Resolution) -> Result<(), LensError> {
    if output.is_empty() {
        return Err(LensError::InvalidParameter(format!(
            "output size must be non-zero, got {output}"
        )));
    }
    Ok(())
}

impl LensModel for CameraLens {
    fn calibration_id(&self) -> &str {
        &self.id
    }

    /// Sub-mode 1: the view axis is tilted `alpha` degrees away from the
    /// optical axis, towards azimuth `beta` (0 up, 90 right, 180 down).
    fn anypoint(
        &self,
        alpha: f64,
        beta: f64,
        zoom: f64,
        submode: u8,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        check_finite(&[("alpha", alpha), ("beta", beta), ("zoom", zoom)])?;
        check_zoom(zoom)?;
        check_output(output)?;
        if submode != 1 {
            return Err(LensError::InvalidParameter(format!(
                "anypoint sub-mode must be 1 for this table type, got {submode}"
            )));
        }

        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), beta.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), alpha.to_radians());
        self.build_tables(output, |col, row| {
            rotation * Self::pinhole_ray(col, row, output, zoom)
        })
    }

    /// Sub-mode 2: pitch `alpha` (positive up), yaw `beta` (positive right),
    /// then `roll` around the view axis.
    fn anypoint_car(
        &self,
        alpha: f64,
        beta: f64,
        roll: f64,
        zoom: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        check_finite(&[("alpha", alpha), ("beta", beta), ("roll", roll), ("zoom", zoom)])?;
        check_zoom(zoom)?;
        check_output(output)?;

        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), beta.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), alpha.to_radians())
            * Rotation3::from_axis_angle(&Vector3::z_axis(), roll.to_radians());
        self.build_tables(output, |col, row| {
            rotation * Self::pinhole_ray(col, row, output, zoom)
        })
    }

    /// Columns sweep the full azimuth circle; rows go from polar angle
    /// `alpha_min` on the top row to `alpha_max` on the bottom row.
    fn panorama(
        &self,
        alpha_min: f64,
        alpha_max: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        check_finite(&[("alpha_min", alpha_min), ("alpha_max", alpha_max)])?;
        check_output(output)?;
        for (name, value) in [("alpha_min", alpha_min), ("alpha_max", alpha_max)] {
            if !(0.0..=180.0).contains(&value) {
                return Err(LensError::InvalidParameter(format!(
                    "{name} must be within [0, 180] degrees, got {value}"
                )));
            }
        }
        if alpha_min == alpha_max {
            return Err(LensError::InvalidParameter(format!(
                "panorama needs distinct polar bounds, both are {alpha_min}"
            )));
        }

        let last_row = output.height.saturating_sub(1).max(1) as f64;
        self.build_tables(output, |col, row| {
            let azimuth = std::f64::consts::TAU * (col as f64 + 0.5) / output.width as f64;
            let polar = (alpha_min + (alpha_max - alpha_min) * row as f64 / last_row).to_radians();
            Vector3::new(
                polar.sin() * azimuth.cos(),
                polar.sin() * azimuth.sin(),
                polar.cos(),
            )
        })
    }
}
