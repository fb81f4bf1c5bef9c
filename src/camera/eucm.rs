//! Extended Unified Camera Model (EUCM) Implementation
//!
//! EUCM extends the Unified Camera Model with a `beta` parameter that turns the
//! projection sphere into an ellipsoid, which fits wide-angle and fisheye
//! lenses well while keeping a closed-form inverse.
//!
//! # References
//!
//! "An Enhanced Unified Camera Model" by Bogdan Khomutenko, Gaëtan Garcia and
//! Philippe Martinet (IEEE RA-L 2016).

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::camera::{read_cam0, validation, CameraModel, CameraModelError, Intrinsics, Resolution};

/// EUCM calibration for wide-angle/fisheye lenses.
///
/// # Fields
///
/// *   `intrinsics`: [`Intrinsics`] - Holds the focal lengths (fx, fy) and principal point (cx, cy).
/// *   `resolution`: [`Resolution`] - The width and height of the calibrated image in pixels.
/// *   `alpha`: `f64` - Blend between the pinhole (`0`) and the spherical model (`1`).
/// *   `beta`: `f64` - Ellipsoid shape parameter, strictly positive.
#[derive(Clone, Serialize, Deserialize)]
pub struct EucmModel {
    pub intrinsics: Intrinsics,
    pub resolution: Resolution,
    pub alpha: f64,
    pub beta: f64,
}

impl EucmModel {
    /// Checks the geometric condition for a valid projection.
    ///
    /// For `alpha > 0.5` part of the sphere maps outside the image plane; the
    /// point is valid only when `z > denom * (alpha - 1) / (2 alpha - 1)`.
    pub fn check_proj_condition(z: f64, denom: f64, alpha: f64) -> bool {
        if alpha > 0.5 {
            let c = (alpha - 1.0) / (2.0 * alpha - 1.0);
            if z < denom * c {
                return false;
            }
        }
        true
    }

    /// Checks the geometric condition for a valid unprojection of a normalized
    /// point with squared radius `r_squared`.
    fn check_unproj_condition(r_squared: f64, alpha: f64, beta: f64) -> bool {
        !(alpha > 0.5 && r_squared > 1.0 / (beta * (2.0 * alpha - 1.0)))
    }
}

impl fmt::Debug for EucmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EUCM [fx: {} fy: {} cx: {} cy: {} alpha: {} beta: {}]",
            self.intrinsics.fx,
            self.intrinsics.fy,
            self.intrinsics.cx,
            self.intrinsics.cy,
            self.alpha,
            self.beta
        )
    }
}

impl CameraModel for EucmModel {
    /// Projects a 3D point from camera coordinates to 2D image coordinates.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointIsOutSideImage`]: If the 3D point cannot be validly projected
    ///   according to the EUCM model's geometric constraints.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        const PRECISION: f64 = 1e-3;

        let x = point_3d.x;
        let y = point_3d.y;
        let z = point_3d.z;

        let d = (self.beta * (x * x + y * y) + z * z).sqrt();
        let denom = self.alpha * d + (1.0 - self.alpha) * z;

        if denom < PRECISION || !Self::check_proj_condition(z, denom, self.alpha) {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let projected_x = self.intrinsics.fx * (x / denom) + self.intrinsics.cx;
        let projected_y = self.intrinsics.fy * (y / denom) + self.intrinsics.cy;

        Ok(Vector2::new(projected_x, projected_y))
    }

    /// Unprojects a 2D image point to a normalized 3D ray in camera coordinates.
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        const PRECISION: f64 = 1e-3;

        let alpha = self.alpha;
        let beta = self.beta;

        let mx = (point_2d.x - self.intrinsics.cx) / self.intrinsics.fx;
        let my = (point_2d.y - self.intrinsics.cy) / self.intrinsics.fy;

        let r_squared = mx * mx + my * my;
        let gamma = 1.0 - alpha;
        let num = 1.0 - r_squared * alpha * alpha * beta;
        let det = 1.0 - (alpha - gamma) * beta * r_squared;

        if det < PRECISION || !Self::check_unproj_condition(r_squared, alpha, beta) {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let mz = num / (gamma + alpha * det.sqrt());
        let norm = (mx * mx + my * my + mz * mz).sqrt();

        Ok(Vector3::new(mx / norm, my / norm, mz / norm))
    }

    /// Loads [`EucmModel`] parameters from a YAML file whose `intrinsics`
    /// array is `[fx, fy, cx, cy, alpha, beta]`.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let block = read_cam0(path, &["alpha", "beta"])?;

        let model = EucmModel {
            intrinsics: block.intrinsics,
            resolution: block.resolution,
            alpha: block.extra[0],
            beta: block.extra[1],
        };

        model.validate_params()?;
        Ok(model)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;

        if !self.alpha.is_finite() {
            return Err(CameraModelError::InvalidParams(
                "alpha must be finite".to_string(),
            ));
        }

        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(CameraModelError::InvalidParams(
                "beta must be finite and positive".to_string(),
            ));
        }

        Ok(())
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_intrinsics(&self) -> Intrinsics {
        self.intrinsics.clone()
    }

    fn get_distortion(&self) -> Vec<f64> {
        vec![self.alpha, self.beta]
    }

    fn model_name(&self) -> &'static str {
        "eucm"
    }
}
