//! Frame-accurate navigation over a [`MediaSource`].
//!
//! The controller is a small state machine:
//!
//! ```text
//!  Stopped --open--> Paused <--pause/stop/end of stream-- Playing
//!                      \-------------------play------------->/
//! ```
//!
//! `Stopped` only describes a controller that never opened a source. Seek,
//! step and stop keep the current state and decode exactly one frame.

use image::RgbImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ViewError;
use crate::media::{MediaBackend, MediaSource, SourceKind, SourceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing was read.
    Idle,
    /// A new frame was decoded. `finished` is set when it was the last frame
    /// of a finite source, in which case the controller paused itself.
    Frame { frame: RgbImage, finished: bool },
    /// The source ran dry before its announced frame count.
    EndOfStream,
}

/// Frame-to-time conversion for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaClock {
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
}

impl MediaClock {
    pub fn seconds_at(&self, position: u64) -> Option<f64> {
        self.fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| position as f64 / fps)
    }

    pub fn total_seconds(&self) -> Option<f64> {
        self.seconds_at(self.frame_count?)
    }

    /// Whole minutes and remaining seconds, as `MM:SS`.
    pub fn format(seconds: f64) -> String {
        let total = seconds.max(0.0).floor() as u64;
        format!("{:02}:{:02}", total / 60, total % 60)
    }
}

const UNKNOWN_TIME: &str = "--:--";
const LIVE_TIME: &str = "00:00";

pub struct PlaybackController {
    backend: Box<dyn MediaBackend>,
    source: Option<Box<dyn MediaSource>>,
    spec: Option<SourceSpec>,
    state: PlaybackState,
    /// Index of the frame on display.
    frame_index: Option<u64>,
    step_seconds: f64,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn MediaBackend>, step_seconds: f64) -> Self {
        PlaybackController {
            backend,
            source: None,
            spec: None,
            state: PlaybackState::Stopped,
            frame_index: None,
            step_seconds,
        }
    }

    /// Open `spec` and decode its first frame.
    ///
    /// The previous source is only replaced once this succeeded; on failure
    /// the controller is left exactly as it was.
    pub fn open(&mut self, spec: SourceSpec) -> Result<RgbImage, ViewError> {
        let mut source = self.backend.open(&spec)?;
        if source.kind() == SourceKind::VideoFile {
            source.set_position(0)?;
        }
        let first = source
            .read_next()?
            .ok_or_else(|| ViewError::MediaOpen(format!("{spec} has no frames")))?;

        info!(
            "Opened {spec} as {:?}: {} frames at {} fps",
            source.kind(),
            source
                .frame_count()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            source
                .fps()
                .map_or_else(|| "unknown".to_string(), |f| f.to_string())
        );
        self.source = Some(source);
        self.spec = Some(spec);
        self.state = PlaybackState::Paused;
        self.frame_index = Some(0);
        Ok(first)
    }

    /// Open the last opened spec again.
    pub fn reopen(&mut self) -> Result<RgbImage, ViewError> {
        let spec = self.spec.clone().ok_or(ViewError::NoSource)?;
        self.open(spec)
    }

    /// Start playing. Returns whether the state changed; still images and
    /// controllers without a decoded frame cannot play.
    pub fn play(&mut self) -> bool {
        let playable = self.frame_index.is_some()
            && self.kind().is_some_and(|kind| kind != SourceKind::StillImage);
        if !playable || self.state == PlaybackState::Playing {
            return false;
        }
        debug!("Playback {:?} -> Playing", self.state);
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        debug!("Playback Playing -> Paused");
        self.state = PlaybackState::Paused;
        true
    }

    /// Rewind to the first frame, decode it and pause.
    pub fn stop(&mut self) -> Result<RgbImage, ViewError> {
        if self.source.is_none() {
            return Err(ViewError::NoSource);
        }
        self.state = PlaybackState::Paused;
        self.goto(0)
    }

    /// Seek to `fraction` of the stream (clamped to `[0, 1]`) and decode that
    /// frame. Sources without a frame count ignore seeks.
    pub fn seek(&mut self, fraction: f64) -> Result<Option<RgbImage>, ViewError> {
        let Some(count) = self.seekable_count()? else {
            return Ok(None);
        };
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let target = ((count as f64 * fraction).floor() as u64).min(count - 1);
        self.goto(target).map(Some)
    }

    /// Seek from a slider reading `value` out of `max`.
    ///
    /// Inverse of [`slider_position`](Self::slider_position): the target is
    /// the first frame whose slider value reaches `value`, so feeding the
    /// slider back never moves playback.
    pub fn seek_slider(&mut self, value: u32, max: u32) -> Result<Option<RgbImage>, ViewError> {
        let Some(count) = self.seekable_count()? else {
            return Ok(None);
        };
        let target = if max == 0 {
            0
        } else {
            let value = value.min(max) as u128;
            (value * count as u128).div_ceil(max as u128) as u64
        };
        self.goto(target.min(count - 1)).map(Some)
    }

    pub fn step_forward(&mut self) -> Result<Option<RgbImage>, ViewError> {
        self.step(1)
    }

    pub fn step_backward(&mut self) -> Result<Option<RgbImage>, ViewError> {
        self.step(-1)
    }

    fn step(&mut self, direction: i64) -> Result<Option<RgbImage>, ViewError> {
        let Some(count) = self.seekable_count()? else {
            return Ok(None);
        };
        let fps = self.fps().unwrap_or(0.0);
        let delta = (self.step_seconds * fps).round() as i64;
        let current = self.frame_index.unwrap_or(0) as i64;
        let target = (current + direction * delta).clamp(0, count as i64 - 1) as u64;
        self.goto(target).map(Some)
    }

    /// Decode the next frame while playing.
    pub fn tick(&mut self) -> Result<TickOutcome, ViewError> {
        if self.state != PlaybackState::Playing {
            return Ok(TickOutcome::Idle);
        }
        let source = self.source.as_mut().ok_or(ViewError::NoSource)?;
        if let Some(count) = source.frame_count() {
            if source.position() >= count {
                self.state = PlaybackState::Paused;
                return Ok(TickOutcome::EndOfStream);
            }
        }

        let frame = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Source ended early, pausing");
                self.state = PlaybackState::Paused;
                return Ok(TickOutcome::EndOfStream);
            }
            Err(err) => {
                warn!("Read failed during playback, pausing: {err}");
                self.state = PlaybackState::Paused;
                return Err(err.into());
            }
        };

        let position = source.position();
        let finished = source.frame_count().is_some_and(|count| position >= count);
        if source.kind() == SourceKind::VideoFile {
            self.frame_index = Some(position.saturating_sub(1));
        }
        if finished {
            debug!("Reached end of stream at frame {position}, pausing");
            self.state = PlaybackState::Paused;
        }
        Ok(TickOutcome::Frame { frame, finished })
    }

    fn seekable_count(&self) -> Result<Option<u64>, ViewError> {
        let source = self.source.as_ref().ok_or(ViewError::NoSource)?;
        Ok(source.frame_count().filter(|count| *count > 0))
    }

    /// Position the source on `target` and decode it. A failure pauses.
    fn goto(&mut self, target: u64) -> Result<RgbImage, ViewError> {
        let source = self.source.as_mut().ok_or(ViewError::NoSource)?;
        let live = source.kind() == SourceKind::LiveCamera;
        let result = if live {
            source.read_next()
        } else {
            source.set_position(target).and_then(|_| source.read_next())
        };

        match result {
            Ok(Some(frame)) => {
                self.frame_index = Some(if live { 0 } else { target });
                Ok(frame)
            }
            Ok(None) => {
                self.state = PlaybackState::Paused;
                Err(ViewError::MediaRead(format!("no frame at index {target}")))
            }
            Err(err) => {
                warn!("Read failed at frame {target}, pausing: {err}");
                self.state = PlaybackState::Paused;
                Err(err.into())
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.source.as_ref().map(|s| s.kind())
    }

    pub fn spec(&self) -> Option<&SourceSpec> {
        self.spec.as_ref()
    }

    /// Source cursor: the number of frames consumed so far.
    pub fn position(&self) -> u64 {
        self.source.as_ref().map_or(0, |s| s.position())
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.source.as_ref().and_then(|s| s.frame_count())
    }

    pub fn fps(&self) -> Option<f64> {
        self.source.as_ref().and_then(|s| s.fps())
    }

    pub fn clock(&self) -> MediaClock {
        MediaClock {
            fps: self.fps(),
            frame_count: self.frame_count(),
        }
    }

    pub fn step_seconds(&self) -> f64 {
        self.step_seconds
    }

    pub fn current_time_text(&self) -> String {
        match self.kind() {
            Some(SourceKind::LiveCamera) => LIVE_TIME.to_string(),
            Some(SourceKind::VideoFile) => self
                .clock()
                .seconds_at(self.position())
                .map_or_else(|| UNKNOWN_TIME.to_string(), MediaClock::format),
            _ => UNKNOWN_TIME.to_string(),
        }
    }

    pub fn total_time_text(&self) -> String {
        match self.kind() {
            Some(SourceKind::LiveCamera) => LIVE_TIME.to_string(),
            Some(SourceKind::VideoFile) => self
                .clock()
                .total_seconds()
                .map_or_else(|| UNKNOWN_TIME.to_string(), MediaClock::format),
            _ => UNKNOWN_TIME.to_string(),
        }
    }

    /// Slider value in `[0, max]` for the frame on display.
    pub fn slider_position(&self, max: u32) -> u32 {
        match (self.frame_count(), self.frame_index) {
            (Some(count), Some(index)) if count > 0 => {
                let value = index as u128 * max as u128 / count as u128;
                value.min(max as u128) as u32
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryBackend, ScriptedSource};

    fn video(frame_count: u64, fps: f64) -> PlaybackController {
        let backend = MemoryBackend::new(move || ScriptedSource::video(frame_count, fps));
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::File("clip.mp4".into())).unwrap();
        controller
    }

    #[test]
    fn test_open_pauses_on_first_frame() {
        let controller = video(10, 30.0);
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert_eq!(controller.frame_index(), Some(0));
        assert_eq!(controller.position(), 1);
        assert_eq!(controller.kind(), Some(SourceKind::VideoFile));
    }

    #[test]
    fn test_failed_open_leaves_controller_unchanged() {
        let mut controller = video(10, 30.0);
        controller.seek(0.5).unwrap();
        let err = controller
            .open(SourceSpec::File("missing.mp4".into()))
            .unwrap_err();
        assert!(matches!(err, ViewError::MediaOpen(_)));
        assert_eq!(controller.frame_index(), Some(5));
        assert_eq!(
            controller.spec(),
            Some(&SourceSpec::File("clip.mp4".into()))
        );

        let mut fresh = PlaybackController::new(
            Box::new(MemoryBackend::new(|| ScriptedSource::video(3, 30.0))),
            5.0,
        );
        assert!(fresh.open(SourceSpec::File("missing.avi".into())).is_err());
        assert_eq!(fresh.state(), PlaybackState::Stopped);
        assert!(!fresh.play());
    }

    #[test]
    fn test_seek_bounds() {
        let (backend, log) = MemoryBackend::video(100, 30.0);
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::File("clip.mp4".into())).unwrap();

        controller.seek(1.0).unwrap();
        assert_eq!(controller.frame_index(), Some(99));
        assert_eq!(log.borrow().seeks.last(), Some(&99));

        controller.seek(0.5).unwrap();
        assert_eq!(controller.frame_index(), Some(50));
        controller.seek(7.0).unwrap();
        assert_eq!(controller.frame_index(), Some(99));
        controller.seek(f64::NAN).unwrap();
        assert_eq!(controller.frame_index(), Some(0));
        assert!(log.borrow().seeks.iter().all(|target| *target < 100));
    }

    #[test]
    fn test_seek_slider() {
        let mut controller = video(200, 25.0);
        controller.seek_slider(250, 1000).unwrap();
        assert_eq!(controller.frame_index(), Some(50));
        controller.seek_slider(3, 0).unwrap();
        assert_eq!(controller.frame_index(), Some(0));
    }

    #[test]
    fn test_step_clamp() {
        let mut controller = video(1000, 30.0);
        controller.seek(0.0025).unwrap();
        assert_eq!(controller.frame_index(), Some(2));

        controller.step_backward().unwrap();
        assert_eq!(controller.frame_index(), Some(0));

        controller.step_forward().unwrap();
        assert_eq!(controller.frame_index(), Some(150));

        controller.seek(1.0).unwrap();
        controller.step_forward().unwrap();
        assert_eq!(controller.frame_index(), Some(999));
    }

    #[test]
    fn test_end_of_stream() {
        let (backend, log) = MemoryBackend::video(10, 30.0);
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::File("clip.mp4".into())).unwrap();
        assert!(controller.play());

        // the first frame was decoded by open
        for _ in 1..9 {
            match controller.tick().unwrap() {
                TickOutcome::Frame { finished, .. } => assert!(!finished),
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(controller.state(), PlaybackState::Playing);
        }
        match controller.tick().unwrap() {
            TickOutcome::Frame { finished, .. } => assert!(finished),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(controller.position(), 10);
        assert_eq!(controller.frame_index(), Some(9));
        assert_eq!(controller.state(), PlaybackState::Paused);

        assert_eq!(controller.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(log.borrow().reads, 10);
    }

    #[test]
    fn test_time_formatting() {
        let mut controller = video(300, 30.0);
        assert_eq!(controller.total_time_text(), "00:10");
        controller.seek(0.1501).unwrap();
        assert_eq!(controller.frame_index(), Some(45));
        assert_eq!(controller.current_time_text(), "00:01");

        assert_eq!(MediaClock::format(0.0), "00:00");
        assert_eq!(MediaClock::format(61.9), "01:01");
        assert_eq!(MediaClock::format(6000.0), "100:00");
    }

    #[test]
    fn test_live_camera_times_and_navigation() {
        let backend = MemoryBackend::new(ScriptedSource::camera);
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::Camera("0".into())).unwrap();

        assert_eq!(controller.current_time_text(), "00:00");
        assert_eq!(controller.total_time_text(), "00:00");
        assert_eq!(controller.slider_position(100), 0);
        assert_eq!(controller.seek(0.5).unwrap(), None);
        assert_eq!(controller.step_forward().unwrap(), None);

        assert!(controller.play());
        for _ in 0..5 {
            assert!(matches!(
                controller.tick().unwrap(),
                TickOutcome::Frame { finished: false, .. }
            ));
        }
        assert!(controller.stop().is_ok());
        assert_eq!(controller.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_still_image_cannot_play() {
        use crate::media::StillImageSource;
        use crate::test_utils::synthetic_frame;

        struct StillBackend;
        impl MediaBackend for StillBackend {
            fn open(
                &self,
                _spec: &SourceSpec,
            ) -> Result<Box<dyn MediaSource>, crate::media::MediaError> {
                Ok(Box::new(StillImageSource::new(synthetic_frame(4, 4, 0))))
            }
        }

        let mut controller = PlaybackController::new(Box::new(StillBackend), 5.0);
        controller.open(SourceSpec::File("img.png".into())).unwrap();
        assert!(!controller.play());
        assert_eq!(controller.current_time_text(), "--:--");
        assert_eq!(controller.total_time_text(), "--:--");
    }

    #[test]
    fn test_read_failure_pauses() {
        let backend = MemoryBackend::new(|| ScriptedSource::video(10, 30.0).failing_from(3));
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::File("clip.mp4".into())).unwrap();
        controller.play();

        assert!(controller.tick().is_ok());
        assert!(controller.tick().is_ok());
        let err = controller.tick().unwrap_err();
        assert!(matches!(err, ViewError::MediaRead(_)));
        assert_eq!(controller.state(), PlaybackState::Paused);
        assert_eq!(controller.frame_index(), Some(2));

        assert!(controller.seek(0.9).is_err());
        assert_eq!(controller.frame_index(), Some(2));
    }

    #[test]
    fn test_slider_position() {
        let mut controller = video(100, 30.0);
        assert_eq!(controller.slider_position(1000), 0);
        controller.seek(1.0).unwrap();
        assert_eq!(controller.slider_position(1000), 990);
        assert_eq!(controller.slider_position(100), 99);
        assert_eq!(controller.slider_position(0), 0);
    }

    #[test]
    fn test_slider_round_trip_keeps_frame() {
        let mut controller = video(100, 30.0);
        for max in [100, 1000] {
            for start in [0.0, 0.375, 1.0] {
                controller.seek(start).unwrap();
                let frame = controller.frame_index();
                for _ in 0..3 {
                    let value = controller.slider_position(max);
                    controller.seek_slider(value, max).unwrap();
                    assert_eq!(controller.frame_index(), frame);
                }
            }
        }

        // a coarse slider settles on the first frame of its bucket
        controller.seek(0.375).unwrap();
        let value = controller.slider_position(10);
        controller.seek_slider(value, 10).unwrap();
        assert_eq!(controller.frame_index(), Some(30));
        controller.seek_slider(controller.slider_position(10), 10).unwrap();
        assert_eq!(controller.frame_index(), Some(30));
        assert_eq!(controller.slider_position(10), value);
    }

    #[test]
    fn test_no_source() {
        let mut controller = PlaybackController::new(
            Box::new(MemoryBackend::new(|| ScriptedSource::video(1, 30.0))),
            5.0,
        );
        assert!(matches!(controller.seek(0.5), Err(ViewError::NoSource)));
        assert!(matches!(controller.stop(), Err(ViewError::NoSource)));
        assert!(matches!(controller.reopen(), Err(ViewError::NoSource)));
        assert_eq!(controller.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(controller.current_time_text(), "--:--");
    }

    #[test]
    fn test_reopen_rewinds() {
        let backend = MemoryBackend::new(|| ScriptedSource::video(50, 30.0));
        let opens = backend.opens();
        let mut controller = PlaybackController::new(Box::new(backend), 5.0);
        controller.open(SourceSpec::File("clip.mp4".into())).unwrap();
        controller.seek(0.5).unwrap();
        controller.reopen().unwrap();
        assert_eq!(controller.frame_index(), Some(0));
        assert_eq!(opens.get(), 2);
    }
}
