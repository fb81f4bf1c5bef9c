//! Viewer settings, loadable from YAML.

use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::frame::OverlayStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Period of the playback timer, see [`ViewerConfig::tick_interval`].
    pub tick_interval_ms: u64,
    /// Jump size of `step_forward` / `step_backward`.
    pub step_seconds: f64,
    /// Frame rate assumed for image-sequence videos.
    pub sequence_fps: f64,
    pub overlay: OverlayStyle,
    /// Image extension used when saving snapshots.
    pub save_format: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            tick_interval_ms: 33,
            step_seconds: 5.0,
            sequence_fps: 30.0,
            overlay: OverlayStyle::default(),
            save_format: "jpg".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn load_from_yaml(path: &str) -> Result<Self, ViewError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ViewError::Config(format!("{path}: {e}")))?;
        let config: ViewerConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ViewError::Config(format!("{path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Time to wait between two playback ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.tick_interval_ms == 0 {
            return Err(ViewError::Config("tick_interval_ms must be positive".into()));
        }
        if !(self.step_seconds.is_finite() && self.step_seconds >= 0.0) {
            return Err(ViewError::Config(format!(
                "step_seconds must be finite and non-negative, got {}",
                self.step_seconds
            )));
        }
        if !(self.sequence_fps.is_finite() && self.sequence_fps > 0.0) {
            return Err(ViewError::Config(format!(
                "sequence_fps must be positive, got {}",
                self.sequence_fps
            )));
        }
        if self.save_format.is_empty() {
            return Err(ViewError::Config("save_format must not be empty".into()));
        }
        Ok(())
    }
}
