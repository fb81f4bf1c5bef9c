//! Projection mode and per-mode parameters.
//!
//! [`ProjectionState`] is plain data. Its setters only mutate fields; deciding
//! when remap tables must be rebuilt is left to the caller. Parameters of the
//! inactive modes are kept, so switching back to a mode restores its view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which projection is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Fisheye,
    Anypoint,
    Panorama,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewMode::Fisheye => "fisheye",
            ViewMode::Anypoint => "anypoint",
            ViewMode::Panorama => "panorama",
        };
        f.write_str(name)
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fisheye" => Ok(ViewMode::Fisheye),
            "anypoint" => Ok(ViewMode::Anypoint),
            "panorama" => Ok(ViewMode::Panorama),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

/// Anypoint parameter sub-mode.
///
/// `Mode1` steers by tilt (`alpha`) and azimuth (`beta`). `Mode2` steers by
/// pitch, yaw and roll, the usual convention for vehicle-mounted cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnypointMode {
    #[default]
    Mode1,
    Mode2,
}

impl AnypointMode {
    pub fn index(&self) -> u8 {
        match self {
            AnypointMode::Mode1 => 1,
            AnypointMode::Mode2 => 2,
        }
    }
}

impl TryFrom<u8> for AnypointMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AnypointMode::Mode1),
            2 => Ok(AnypointMode::Mode2),
            other => Err(format!("anypoint sub-mode must be 1 or 2, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnypointParams {
    pub mode: AnypointMode,
    pub alpha: f64,
    pub beta: f64,
    /// Only used by [`AnypointMode::Mode2`].
    pub roll: f64,
    pub zoom: f64,
}

impl AnypointParams {
    pub const DEFAULT_ZOOM: f64 = 2.0;
}

impl Default for AnypointParams {
    fn default() -> Self {
        AnypointParams {
            mode: AnypointMode::Mode1,
            alpha: 0.0,
            beta: 0.0,
            roll: 0.0,
            zoom: Self::DEFAULT_ZOOM,
        }
    }
}

/// Polar angle bounds of the panorama, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanoramaParams {
    pub alpha_min: f64,
    pub alpha_max: f64,
}

impl Default for PanoramaParams {
    fn default() -> Self {
        PanoramaParams {
            alpha_min: 110.0,
            alpha_max: 10.0,
        }
    }
}

/// Quick anypoint directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnypointPreset {
    Center,
    Up,
    Left,
    Right,
    Down,
}

impl AnypointPreset {
    /// `(alpha, beta)` for sub-mode 1.
    fn mode1(&self) -> (f64, f64) {
        match self {
            AnypointPreset::Center => (0.0, 0.0),
            AnypointPreset::Up => (75.0, 0.0),
            AnypointPreset::Left => (65.0, -90.0),
            AnypointPreset::Right => (65.0, 90.0),
            AnypointPreset::Down => (65.0, 180.0),
        }
    }

    /// `(alpha, beta, roll)` for sub-mode 2.
    fn mode2(&self) -> (f64, f64, f64) {
        match self {
            AnypointPreset::Center => (0.0, 0.0, 0.0),
            AnypointPreset::Up => (50.0, 0.0, 0.0),
            AnypointPreset::Left => (0.0, -75.0, 0.0),
            AnypointPreset::Right => (0.0, 65.0, 0.0),
            AnypointPreset::Down => (-65.0, 0.0, 0.0),
        }
    }
}

impl FromStr for AnypointPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "center" => Ok(AnypointPreset::Center),
            "up" => Ok(AnypointPreset::Up),
            "left" => Ok(AnypointPreset::Left),
            "right" => Ok(AnypointPreset::Right),
            "down" => Ok(AnypointPreset::Down),
            other => Err(format!("unknown anypoint preset '{other}'")),
        }
    }
}

/// Parameters that determine the remap tables of the active mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveProjection {
    Fisheye,
    Anypoint(AnypointParams),
    Panorama(PanoramaParams),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionState {
    pub mode: ViewMode,
    pub anypoint: AnypointParams,
    pub panorama: PanoramaParams,
}

impl ProjectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    pub fn set_anypoint_params(&mut self, alpha: f64, beta: f64, roll: f64, zoom: f64) {
        self.anypoint.alpha = alpha;
        self.anypoint.beta = beta;
        self.anypoint.roll = roll;
        self.anypoint.zoom = zoom;
    }

    /// Switch the anypoint sub-mode. The geometry is reset to defaults since
    /// angles of one sub-mode mean something else in the other.
    pub fn set_anypoint_submode(&mut self, mode: AnypointMode) {
        self.anypoint.mode = mode;
        self.reset_anypoint();
    }

    pub fn set_panorama_params(&mut self, alpha_min: f64, alpha_max: f64) {
        self.panorama.alpha_min = alpha_min;
        self.panorama.alpha_max = alpha_max;
    }

    /// alpha = 0, beta = 0, roll = 0, zoom = 2; the sub-mode is kept.
    pub fn reset_anypoint(&mut self) {
        self.anypoint = AnypointParams {
            mode: self.anypoint.mode,
            ..AnypointParams::default()
        };
    }

    /// alpha_min = 110, alpha_max = 10.
    pub fn reset_panorama(&mut self) {
        self.panorama = PanoramaParams::default();
    }

    /// Apply a preset direction for the current sub-mode. Zoom is kept, and
    /// roll is only touched in sub-mode 2.
    pub fn apply_anypoint_preset(&mut self, preset: AnypointPreset) {
        match self.anypoint.mode {
            AnypointMode::Mode1 => {
                let (alpha, beta) = preset.mode1();
                self.anypoint.alpha = alpha;
                self.anypoint.beta = beta;
            }
            AnypointMode::Mode2 => {
                let (alpha, beta, roll) = preset.mode2();
                self.anypoint.alpha = alpha;
                self.anypoint.beta = beta;
                self.anypoint.roll = roll;
            }
        }
    }

    pub fn active(&self) -> ActiveProjection {
        match self.mode {
            ViewMode::Fisheye => ActiveProjection::Fisheye,
            ViewMode::Anypoint => ActiveProjection::Anypoint(self.anypoint.clone()),
            ViewMode::Panorama => ActiveProjection::Panorama(self.panorama.clone()),
        }
    }
}
