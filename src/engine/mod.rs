//! Coordination of projection edits, playback and frame production.
//!
//! [`ViewEngine`] is the only owner of the projection state, the mapping
//! cache and the playback controller. Every operation is synchronous: it
//! finishes the work for at most one frame before returning, and publishes
//! a fresh [`FrameBundle`] when the displayed images changed.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;

use crate::camera::{CameraType, Resolution};
use crate::config::ViewerConfig;
use crate::error::{Result, ViewError};
use crate::frame::{FrameBundle, FrameProcessor};
use crate::lens::{CameraLens, LensModel};
use crate::mapping::MappingCache;
use crate::media::{FileBackend, MediaBackend, SourceKind, SourceSpec};
use crate::playback::{PlaybackController, PlaybackState, TickOutcome};
use crate::projection::{AnypointMode, AnypointPreset, ProjectionState, ViewMode};
use crate::remap::save_image;

/// Slider resolution used by [`ViewEngine::status`].
const STATUS_SLIDER_MAX: u32 = 1000;

/// What a timer tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    /// Not playing; the timer can be stopped.
    Idle,
    /// A new bundle was published.
    Advanced,
    /// Playback reached the end of the stream and paused.
    Finished,
}

/// Serialisable snapshot of the engine for display or logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub projection: ProjectionState,
    pub playback: PlaybackState,
    pub source: Option<SourceKind>,
    pub frame_index: Option<u64>,
    pub frame_count: Option<u64>,
    pub current_time: String,
    pub total_time: String,
    pub slider: u32,
    pub calibration: Option<String>,
    pub camera_type: Option<CameraType>,
    pub recomputes: usize,
}

type Listener = Box<dyn FnMut(&FrameBundle)>;

pub struct ViewEngine {
    projection: ProjectionState,
    mapping: MappingCache,
    playback: PlaybackController,
    processor: FrameProcessor,
    lens: Option<Box<dyn LensModel>>,
    camera_type: Option<CameraType>,
    /// Raw frame behind the current bundle.
    frame: Option<RgbImage>,
    bundle: Option<FrameBundle>,
    listeners: Vec<Listener>,
    config: ViewerConfig,
}

impl ViewEngine {
    pub fn new(config: ViewerConfig, backend: Box<dyn MediaBackend>) -> Self {
        ViewEngine {
            projection: ProjectionState::new(),
            mapping: MappingCache::new(),
            playback: PlaybackController::new(backend, config.step_seconds),
            processor: FrameProcessor::new(config.overlay.clone()),
            lens: None,
            camera_type: None,
            frame: None,
            bundle: None,
            listeners: Vec::new(),
            config,
        }
    }

    /// Engine reading images and image sequences from disk.
    pub fn with_file_backend(config: ViewerConfig) -> Self {
        let backend = FileBackend::new(config.sequence_fps);
        ViewEngine::new(config, Box::new(backend))
    }

    // ---- sources and calibration ----

    /// Open a new source and show its first frame. On failure the engine
    /// keeps its current source and bundle.
    pub fn open_source(&mut self, spec: SourceSpec) -> Result<()> {
        let frame = self.playback.open(spec).inspect_err(|err| {
            warn!("Keeping current source: {err}");
        })?;
        self.show_frame(frame);
        Ok(())
    }

    /// Switch to another calibration.
    ///
    /// The cache is invalidated and the current frame reprocessed with the new
    /// lens. If that fails the previous calibration is restored. Video and
    /// camera sources are then reopened from the start; when the reopen fails
    /// the new calibration stays applied and the current source keeps playing.
    pub fn set_calibration(&mut self, lens: Box<dyn LensModel>) -> Result<()> {
        let id = lens.calibration_id().to_string();
        let previous_lens = self.lens.replace(lens);
        let previous_cache = self.mapping.clone();
        self.mapping.invalidate();

        if let Err(err) = self.refresh() {
            warn!("Calibration {id} rejected, keeping the previous one: {err}");
            self.lens = previous_lens;
            self.mapping = previous_cache;
            return Err(match err {
                ViewError::InvalidProjectionParameter(msg) => ViewError::RecoverableConfig(msg),
                other => other,
            });
        }
        info!("Calibration set to {id}");

        if matches!(
            self.playback.kind(),
            Some(SourceKind::VideoFile | SourceKind::LiveCamera)
        ) {
            // the current frame is already reprocessed with the new lens
            match self.playback.reopen() {
                Ok(frame) => self.show_frame(frame),
                Err(err) => warn!("Cannot reopen source for {id}, keeping the current one: {err}"),
            }
        }
        Ok(())
    }

    /// Load a calibration file of `camera_type` and apply it.
    pub fn select_camera_type(&mut self, camera_type: CameraType, path: &str) -> Result<()> {
        let lens = CameraLens::from_yaml(camera_type, path).map_err(|err| {
            warn!("Cannot load {camera_type} calibration {path}: {err}");
            ViewError::RecoverableConfig(err.to_string())
        })?;
        self.set_calibration(Box::new(lens))?;
        self.camera_type = Some(camera_type);
        Ok(())
    }

    // ---- projection edits ----

    pub fn set_mode(&mut self, mode: ViewMode) -> Result<()> {
        self.edit(|state| state.set_mode(mode))
    }

    pub fn set_anypoint_params(&mut self, alpha: f64, beta: f64, roll: f64, zoom: f64) -> Result<()> {
        self.edit(|state| state.set_anypoint_params(alpha, beta, roll, zoom))
    }

    pub fn set_anypoint_submode(&mut self, submode: u8) -> Result<()> {
        let mode = AnypointMode::try_from(submode).map_err(ViewError::InvalidProjectionParameter)?;
        self.edit(|state| state.set_anypoint_submode(mode))
    }

    pub fn set_panorama_params(&mut self, alpha_min: f64, alpha_max: f64) -> Result<()> {
        self.edit(|state| state.set_panorama_params(alpha_min, alpha_max))
    }

    pub fn reset_anypoint(&mut self) -> Result<()> {
        self.edit(ProjectionState::reset_anypoint)
    }

    pub fn reset_panorama(&mut self) -> Result<()> {
        self.edit(ProjectionState::reset_panorama)
    }

    pub fn apply_anypoint_preset(&mut self, preset: AnypointPreset) -> Result<()> {
        self.edit(|state| state.apply_anypoint_preset(preset))
    }

    /// Apply `change` and reprocess the current frame. A failed refresh rolls
    /// the state back so it keeps describing the displayed result.
    fn edit<F: FnOnce(&mut ProjectionState)>(&mut self, change: F) -> Result<()> {
        let previous = self.projection.clone();
        change(&mut self.projection);
        if self.projection == previous {
            return Ok(());
        }
        if let Err(err) = self.refresh() {
            warn!("Projection change rejected: {err}");
            self.projection = previous;
            return Err(err);
        }
        Ok(())
    }

    // ---- playback ----

    pub fn play(&mut self) -> bool {
        self.playback.play()
    }

    pub fn pause(&mut self) -> bool {
        self.playback.pause()
    }

    pub fn stop(&mut self) -> Result<()> {
        let frame = self.playback.stop()?;
        self.show_frame(frame);
        Ok(())
    }

    pub fn seek(&mut self, fraction: f64) -> Result<()> {
        let frame = self.playback.seek(fraction)?;
        self.show_optional(frame);
        Ok(())
    }

    pub fn seek_slider(&mut self, value: u32, max: u32) -> Result<()> {
        let frame = self.playback.seek_slider(value, max)?;
        self.show_optional(frame);
        Ok(())
    }

    pub fn step_forward(&mut self) -> Result<()> {
        let frame = self.playback.step_forward()?;
        self.show_optional(frame);
        Ok(())
    }

    pub fn step_backward(&mut self) -> Result<()> {
        let frame = self.playback.step_backward()?;
        self.show_optional(frame);
        Ok(())
    }

    /// Called by the display timer every `tick_interval_ms`.
    pub fn tick(&mut self) -> Result<TickStatus> {
        match self.playback.tick()? {
            TickOutcome::Idle => Ok(TickStatus::Idle),
            TickOutcome::EndOfStream => Ok(TickStatus::Finished),
            TickOutcome::Frame { frame, finished } => {
                self.show_frame(frame);
                Ok(if finished {
                    TickStatus::Finished
                } else {
                    TickStatus::Advanced
                })
            }
        }
    }

    // ---- frame production ----

    fn show_optional(&mut self, frame: Option<RgbImage>) {
        if let Some(frame) = frame {
            self.show_frame(frame);
        }
    }

    /// Make `frame` current and publish its bundle. If the tables cannot be
    /// built for it the frame is shown unprojected.
    fn show_frame(&mut self, frame: RgbImage) {
        self.frame = Some(frame);
        if let Err(err) = self.refresh() {
            warn!("Showing unprojected frame: {err}");
            self.projection.set_mode(ViewMode::Fisheye);
            if let Some(frame) = &self.frame {
                let bundle = FrameBundle::passthrough(frame);
                self.publish(bundle);
            }
        }
    }

    /// Bring the tables up to date and reprocess the current frame.
    fn refresh(&mut self) -> Result<()> {
        let Some(frame) = &self.frame else {
            return MappingCache::validate(&self.projection, self.lens.as_deref());
        };

        let size = Resolution::new(frame.width(), frame.height());
        let tables = self
            .mapping
            .ensure_current(&self.projection, self.lens.as_deref(), size)?;
        let bundle = self.processor.process(frame, self.projection.mode, tables);
        self.publish(bundle);
        Ok(())
    }

    fn publish(&mut self, bundle: FrameBundle) {
        for listener in &mut self.listeners {
            listener(&bundle);
        }
        self.bundle = Some(bundle);
    }

    /// Register a callback run on every published bundle.
    pub fn subscribe<F: FnMut(&FrameBundle) + 'static>(&mut self, listener: F) {
        self.listeners.push(Box::new(listener));
    }

    /// Write the current result and original images into `dir`.
    pub fn save_snapshot(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let bundle = self.bundle.as_ref().ok_or(ViewError::NoSource)?;
        std::fs::create_dir_all(dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let ext = &self.config.save_format;
        let result_path = dir.join(format!("image_result_{stamp}.{ext}"));
        let original_path = dir.join(format!("image_original_{stamp}.{ext}"));

        for (image, path) in [(&bundle.result, &result_path), (&bundle.original, &original_path)] {
            save_image(image, &path.to_string_lossy())
                .map_err(|e| ViewError::Io(std::io::Error::other(e.to_string())))?;
        }
        debug!("Saved snapshot {}", result_path.display());
        Ok((result_path, original_path))
    }

    // ---- accessors ----

    pub fn current_bundle(&self) -> Option<&FrameBundle> {
        self.bundle.as_ref()
    }

    pub fn current_time_text(&self) -> String {
        self.playback.current_time_text()
    }

    pub fn total_time_text(&self) -> String {
        self.playback.total_time_text()
    }

    pub fn slider_position(&self, max: u32) -> u32 {
        self.playback.slider_position(max)
    }

    pub fn projection(&self) -> &ProjectionState {
        &self.projection
    }

    pub fn mapping(&self) -> &MappingCache {
        &self.mapping
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn calibration_id(&self) -> Option<&str> {
        self.lens.as_deref().map(|lens| lens.calibration_id())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            projection: self.projection.clone(),
            playback: self.playback.state(),
            source: self.playback.kind(),
            frame_index: self.playback.frame_index(),
            frame_count: self.playback.frame_count(),
            current_time: self.current_time_text(),
            total_time: self.total_time_text(),
            slider: self.slider_position(STATUS_SLIDER_MAX),
            calibration: self.calibration_id().map(str::to_string),
            camera_type: self.camera_type,
            recomputes: self.mapping.recompute_count(),
        }
    }
}
