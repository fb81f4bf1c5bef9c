//! Fisheye camera calibrations backing the lens model.
//!
//! A calibration maps between 3D viewing rays and fisheye pixel coordinates.
//! The [`CameraModel`] trait exposes exactly that, and the projection engine
//! only ever needs `project` to build its remap tables. Calibrations are read
//! from YAML files laid out as:
//!
//! ```yaml
//! cam0:
//!   camera_model: double_sphere
//!   intrinsics: [fx, fy, cx, cy, <model parameters...>]
//!   resolution: [width, height]
//! ```

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;
use yaml_rust::YamlLoader;

pub mod double_sphere;
pub mod eucm;
pub mod kannala_brandt;

pub use double_sphere::DoubleSphereModel;
pub use eucm::EucmModel;
pub use kannala_brandt::KannalaBrandtModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Input point is outside the image")]
    PointIsOutSideImage,
    #[error("Point is at the camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Unknown camera type: {0}")]
    UnknownCameraType(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Trait defining the core functionality for camera models
pub trait CameraModel: fmt::Debug {
    /// Project a 3D point (or ray) to 2D image coordinates
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Unproject 2D image coordinates to a unit-length 3D ray
    fn unproject(&self, point_2d: &Vector2<f64>) -> Result<Vector3<f64>, CameraModelError>;

    /// Load camera parameters from a YAML file
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError>
    where
        Self: Sized;

    /// Validate camera parameters
    fn validate_params(&self) -> Result<(), CameraModelError>;

    fn get_resolution(&self) -> Resolution;

    fn get_intrinsics(&self) -> Intrinsics;

    fn get_distortion(&self) -> Vec<f64>;

    /// Short model name, as written in the `camera_model` YAML field.
    fn model_name(&self) -> &'static str;
}

/// The calibration families a lens can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraType {
    DoubleSphere,
    Eucm,
    KannalaBrandt,
}

impl CameraType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraType::DoubleSphere => "double_sphere",
            CameraType::Eucm => "eucm",
            CameraType::KannalaBrandt => "kannala_brandt",
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraType {
    type Err = CameraModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ds" | "double_sphere" => Ok(CameraType::DoubleSphere),
            "eucm" => Ok(CameraType::Eucm),
            "kb" | "kannala_brandt" => Ok(CameraType::KannalaBrandt),
            other => Err(CameraModelError::UnknownCameraType(other.to_string())),
        }
    }
}

/// Load a calibration of the given type from a YAML file.
pub fn load_camera_model(
    camera_type: CameraType,
    path: &str,
) -> Result<Box<dyn CameraModel>, CameraModelError> {
    log::info!("Loading {camera_type} calibration from: {path}");
    let model: Box<dyn CameraModel> = match camera_type {
        CameraType::DoubleSphere => Box::new(DoubleSphereModel::load_from_yaml(path)?),
        CameraType::Eucm => Box::new(EucmModel::load_from_yaml(path)?),
        CameraType::KannalaBrandt => Box::new(KannalaBrandtModel::load_from_yaml(path)?),
    };
    Ok(model)
}

/// Raw `cam0` block of a calibration file.
#[derive(Debug, Clone)]
pub(crate) struct Cam0Block {
    pub intrinsics: Intrinsics,
    /// Model-specific parameters following `fx, fy, cx, cy`.
    pub extra: Vec<f64>,
    pub resolution: Resolution,
}

/// Reads the `cam0` block shared by every calibration file.
///
/// `extra_names` names the model parameters expected after `fx, fy, cx, cy`;
/// they are only used to build error messages.
pub(crate) fn read_cam0(path: &str, extra_names: &[&str]) -> Result<Cam0Block, CameraModelError> {
    let contents = fs::read_to_string(path)?;
    let docs = YamlLoader::load_from_str(&contents)?;

    if docs.is_empty() {
        return Err(CameraModelError::InvalidParams(
            "Empty YAML document".to_string(),
        ));
    }

    let doc = &docs[0];

    let values = doc["cam0"]["intrinsics"].as_vec().ok_or_else(|| {
        CameraModelError::InvalidParams("YAML missing 'intrinsics' array under 'cam0'".to_string())
    })?;
    let resolution = doc["cam0"]["resolution"].as_vec().ok_or_else(|| {
        CameraModelError::InvalidParams("YAML missing 'resolution' array under 'cam0'".to_string())
    })?;

    let names: Vec<&str> = ["fx", "fy", "cx", "cy"]
        .iter()
        .chain(extra_names.iter())
        .copied()
        .collect();
    if values.len() < names.len() {
        return Err(CameraModelError::InvalidParams(format!(
            "Intrinsics array in YAML must have at least {} elements ({})",
            names.len(),
            names.join(", ")
        )));
    }

    let mut params = Vec::with_capacity(names.len());
    for (value, name) in values.iter().zip(names.iter()) {
        // yaml-rust keeps integers like `1` as Integer, so accept both
        let v = value
            .as_f64()
            .or_else(|| value.as_i64().map(|i| i as f64))
            .ok_or_else(|| {
                CameraModelError::InvalidParams(format!("Invalid {name} in YAML: not a float"))
            })?;
        params.push(v);
    }

    if resolution.len() < 2 {
        return Err(CameraModelError::InvalidParams(
            "Resolution array in YAML must have at least 2 elements (width, height)".to_string(),
        ));
    }
    let width = resolution[0].as_i64().ok_or_else(|| {
        CameraModelError::InvalidParams("Invalid width in YAML: not an integer".to_string())
    })?;
    let height = resolution[1].as_i64().ok_or_else(|| {
        CameraModelError::InvalidParams("Invalid height in YAML: not an integer".to_string())
    })?;
    if width <= 0 || height <= 0 {
        return Err(CameraModelError::InvalidParams(
            "Resolution must be positive".to_string(),
        ));
    }

    Ok(Cam0Block {
        intrinsics: Intrinsics {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
        },
        extra: params[4..].to_vec(),
        resolution: Resolution::new(width as u32, height as u32),
    })
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if !(intrinsics.fx > 0.0) || !(intrinsics.fy > 0.0) {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}
