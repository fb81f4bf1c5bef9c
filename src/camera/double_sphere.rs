//! Implements the Double Sphere camera model.
//!
//! The Double Sphere model projects a point onto two unit spheres whose
//! centers are shifted by `xi`, then onto an image plane shifted by `alpha`.
//! It handles fields of view beyond 180 degrees with closed-form projection
//! and unprojection, which keeps remap table generation cheap.
//!
//! # References
//!
//! "The Double Sphere Camera Model" by Vladyslav Usenko, Nikolaus Demmel and
//! Daniel Cremers (3DV 2018).

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::camera::{read_cam0, validation, CameraModel, CameraModelError, Intrinsics, Resolution};

/// Double Sphere calibration: intrinsics plus `xi` and `alpha`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleSphereModel {
    pub intrinsics: Intrinsics,
    pub resolution: Resolution,
    /// Distance between the two sphere centers.
    pub xi: f64,
    /// Image plane shift, in `(0, 1]`.
    pub alpha: f64,
}

impl CameraModel for DoubleSphereModel {
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        const PRECISION: f64 = 1e-3;

        let x = point_3d.x;
        let y = point_3d.y;
        let z = point_3d.z;

        let r_squared = (x * x) + (y * y);
        let d1 = (r_squared + (z * z)).sqrt();
        if d1 < f64::EPSILON {
            return Err(CameraModelError::PointAtCameraCenter);
        }
        let gamma = self.xi * d1 + z;
        let d2 = (r_squared + gamma * gamma).sqrt();

        // Points behind the valid hemisphere-plus region fail this test
        let w1 = if self.alpha <= 0.5 {
            self.alpha / (1.0 - self.alpha)
        } else {
            (1.0 - self.alpha) / self.alpha
        };
        let w2 = (w1 + self.xi) / (2.0 * w1 * self.xi + self.xi * self.xi + 1.0).sqrt();
        if z <= -w2 * d1 {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let denom = self.alpha * d2 + (1.0 - self.alpha) * gamma;
        if denom < PRECISION * d1 {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let projected_x = self.intrinsics.fx * (x / denom) + self.intrinsics.cx;
        let projected_y = self.intrinsics.fy * (y / denom) + self.intrinsics.cy;

        Ok(Vector2::new(projected_x, projected_y))
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        const PRECISION: f64 = 1e-3;

        let alpha = self.alpha;
        let xi = self.xi;

        let mx = (point_2d.x - self.intrinsics.cx) / self.intrinsics.fx;
        let my = (point_2d.y - self.intrinsics.cy) / self.intrinsics.fy;
        let r_squared = (mx * mx) + (my * my);

        if alpha > 0.5 && (2.0 * alpha - 1.0) * r_squared >= 1.0 {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let mz = (1.0 - alpha * alpha * r_squared)
            / (alpha * (1.0 - (2.0 * alpha - 1.0) * r_squared).sqrt() + 1.0 - alpha);
        let mz_squared = mz * mz;

        let num = mz * xi + (mz_squared + (1.0 - xi * xi) * r_squared).sqrt();
        let denom = mz_squared + r_squared;
        if denom < PRECISION {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let coeff = num / denom;
        let ray = Vector3::new(coeff * mx, coeff * my, coeff * mz - xi);

        Ok(ray.normalize())
    }

    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let block = read_cam0(path, &["xi", "alpha"])?;

        let model = DoubleSphereModel {
            intrinsics: block.intrinsics,
            resolution: block.resolution,
            xi: block.extra[0],
            alpha: block.extra[1],
        };

        model.validate_params()?;
        Ok(model)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;

        if !self.xi.is_finite() {
            return Err(CameraModelError::InvalidParams(
                "xi must be finite".to_string(),
            ));
        }

        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(CameraModelError::InvalidParams(
                "alpha must be in (0, 1]".to_string(),
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
        vec![self.xi, self.alpha]
    }

    fn model_name(&self) -> &'static str {
        "double_sphere"
    }
}
