//! Kannala-Brandt (equidistant polynomial) fisheye model.
//!
//! The image radius is a polynomial in the incidence angle `theta`:
//! `r(theta) = theta + k1 theta^3 + k2 theta^5 + k3 theta^7 + k4 theta^9`.
//! Unlike the sphere-based models it can represent rays past 90 degrees, which
//! panorama views of 200+ degree lenses depend on.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::camera::{read_cam0, validation, CameraModel, CameraModelError, Intrinsics, Resolution};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KannalaBrandtModel {
    pub intrinsics: Intrinsics,
    pub resolution: Resolution,
    pub distortions: [f64; 4], // k1, k2, k3, k4
}

impl KannalaBrandtModel {
    const NEWTON_ITERATIONS: usize = 10;

    fn radius(&self, theta: f64) -> f64 {
        let [k1, k2, k3, k4] = self.distortions;
        let theta2 = theta * theta;
        theta * (1.0 + theta2 * (k1 + theta2 * (k2 + theta2 * (k3 + theta2 * k4))))
    }

    fn radius_derivative(&self, theta: f64) -> f64 {
        let [k1, k2, k3, k4] = self.distortions;
        let theta2 = theta * theta;
        1.0 + theta2 * (3.0 * k1 + theta2 * (5.0 * k2 + theta2 * (7.0 * k3 + theta2 * 9.0 * k4)))
    }
}

impl CameraModel for KannalaBrandtModel {
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let x = point_3d.x;
        let y = point_3d.y;
        let z = point_3d.z;

        let r = (x * x + y * y).sqrt();
        if r < f64::EPSILON {
            if z > 0.0 {
                return Ok(Vector2::new(self.intrinsics.cx, self.intrinsics.cy));
            }
            return Err(CameraModelError::PointAtCameraCenter);
        }

        let theta = r.atan2(z);
        let radius = self.radius(theta);
        // The polynomial folds back for large angles; such rays are outside the lens
        if self.radius_derivative(theta) <= 0.0 {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let projected_x = self.intrinsics.fx * radius * x / r + self.intrinsics.cx;
        let projected_y = self.intrinsics.fy * radius * y / r + self.intrinsics.cy;

        Ok(Vector2::new(projected_x, projected_y))
    }

    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError> {
        let mx = (point_2d.x - self.intrinsics.cx) / self.intrinsics.fx;
        let my = (point_2d.y - self.intrinsics.cy) / self.intrinsics.fy;
        let ru = (mx * mx + my * my).sqrt();

        if ru < f64::EPSILON {
            return Ok(Vector3::new(0.0, 0.0, 1.0));
        }

        // Newton iterations on r(theta) = ru, starting from the equidistant guess
        let mut theta = ru;
        for _ in 0..Self::NEWTON_ITERATIONS {
            let derivative = self.radius_derivative(theta);
            if derivative.abs() < f64::EPSILON {
                return Err(CameraModelError::PointIsOutSideImage);
            }
            theta -= (self.radius(theta) - ru) / derivative;
        }

        if !theta.is_finite() || theta < 0.0 || theta > std::f64::consts::PI {
            return Err(CameraModelError::PointIsOutSideImage);
        }

        let sin_theta = theta.sin();
        Ok(Vector3::new(
            sin_theta * mx / ru,
            sin_theta * my / ru,
            theta.cos(),
        ))
    }

    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let block = read_cam0(path, &["k1", "k2", "k3", "k4"])?;

        let model = KannalaBrandtModel {
            intrinsics: block.intrinsics,
            resolution: block.resolution,
            distortions: [block.extra[0], block.extra[1], block.extra[2], block.extra[3]],
        };

        model.validate_params()?;
        Ok(model)
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        if self.distortions.iter().any(|k| !k.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "Kannala-Brandt coefficients must be finite".to_string(),
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
        self.distortions.to_vec()
    }

    fn model_name(&self) -> &'static str {
        "kannala_brandt"
    }
}
