//! Test doubles shared by the unit tests: synthetic frames, a lens model that
//! counts its calls, scripted media sources and an in-memory backend.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use image::{Rgb, RgbImage};
use nalgebra::DMatrix;

use crate::camera::Resolution;
use crate::lens::{LensError, LensModel, RemapTables};
use crate::media::{MediaBackend, MediaError, MediaSource, SourceKind, SourceSpec};

/// Deterministic test pattern; different seeds give different frames.
pub(crate) fn synthetic_frame(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(7).wrapping_add(seed),
            (y as u8).wrapping_mul(13),
            seed,
        ])
    })
}

/// Tables where every output pixel samples the same input pixel.
pub(crate) fn identity_tables(width: u32, height: u32) -> RemapTables {
    let (w, h) = (width as usize, height as usize);
    let map_x = DMatrix::from_fn(h, w, |_, c| c as f32);
    let map_y = DMatrix::from_fn(h, w, |r, _| r as f32);
    RemapTables::new(map_x, map_y).unwrap()
}

/// Lens model producing identity tables and counting how often it runs.
/// Rejects non-positive zoom and equal panorama bounds.
#[derive(Debug)]
pub(crate) struct CountingLens {
    id: String,
    calls: Cell<usize>,
}

impl CountingLens {
    pub(crate) fn new(id: &str) -> Self {
        CountingLens {
            id: id.to_string(),
            calls: Cell::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    fn tables(&self, output: Resolution) -> Result<RemapTables, LensError> {
        self.calls.set(self.calls.get() + 1);
        if output.is_empty() {
            return Err(LensError::InvalidParameter("empty output".into()));
        }
        Ok(identity_tables(output.width, output.height))
    }
}

impl LensModel for CountingLens {
    fn calibration_id(&self) -> &str {
        &self.id
    }

    fn anypoint(
        &self,
        _alpha: f64,
        _beta: f64,
        zoom: f64,
        _submode: u8,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        if zoom <= 0.0 {
            return Err(LensError::InvalidParameter(format!("zoom {zoom}")));
        }
        self.tables(output)
    }

    fn anypoint_car(
        &self,
        _alpha: f64,
        _beta: f64,
        _roll: f64,
        zoom: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        if zoom <= 0.0 {
            return Err(LensError::InvalidParameter(format!("zoom {zoom}")));
        }
        self.tables(output)
    }

    fn panorama(
        &self,
        alpha_min: f64,
        alpha_max: f64,
        output: Resolution,
    ) -> Result<RemapTables, LensError> {
        if alpha_min == alpha_max {
            return Err(LensError::InvalidParameter("equal bounds".into()));
        }
        self.tables(output)
    }
}

/// What a scripted source was asked to do.
#[derive(Debug, Default)]
pub(crate) struct SourceLog {
    pub(crate) reads: usize,
    pub(crate) seeks: Vec<u64>,
}

/// Media source with a fixed frame count (or none, for a live camera) whose
/// frames are synthetic. Reads can be scripted to fail from a given index on.
pub(crate) struct ScriptedSource {
    kind: SourceKind,
    frame_count: Option<u64>,
    fps: Option<f64>,
    position: u64,
    fail_from: Option<u64>,
    log: Rc<RefCell<SourceLog>>,
}

impl ScriptedSource {
    pub(crate) const SIZE: (u32, u32) = (16, 12);

    pub(crate) fn video(frame_count: u64, fps: f64) -> Self {
        ScriptedSource {
            kind: SourceKind::VideoFile,
            frame_count: Some(frame_count),
            fps: Some(fps),
            position: 0,
            fail_from: None,
            log: Rc::default(),
        }
    }

    pub(crate) fn camera() -> Self {
        ScriptedSource {
            kind: SourceKind::LiveCamera,
            frame_count: None,
            fps: Some(30.0),
            ..ScriptedSource::video(0, 30.0)
        }
    }

    pub(crate) fn failing_from(mut self, index: u64) -> Self {
        self.fail_from = Some(index);
        self
    }

    pub(crate) fn with_log(mut self, log: Rc<RefCell<SourceLog>>) -> Self {
        self.log = log;
        self
    }
}

impl MediaSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn read_next(&mut self) -> Result<Option<RgbImage>, MediaError> {
        if self.fail_from.is_some_and(|n| self.position >= n) {
            return Err(MediaError::Read(format!("scripted failure at {}", self.position)));
        }
        if self.frame_count.is_some_and(|n| self.position >= n) {
            return Ok(None);
        }
        self.log.borrow_mut().reads += 1;
        let (w, h) = Self::SIZE;
        let frame = synthetic_frame(w, h, self.position as u8);
        if self.kind == SourceKind::VideoFile {
            self.position += 1;
        }
        Ok(Some(frame))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, index: u64) -> Result<(), MediaError> {
        self.log.borrow_mut().seeks.push(index);
        if let Some(n) = self.frame_count {
            self.position = index.min(n);
        }
        Ok(())
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }
}

type SourceFactory = Box<dyn Fn() -> ScriptedSource>;

/// Backend handing out a fresh scripted source on every open. Paths whose
/// file name starts with `missing` fail to open.
pub(crate) struct MemoryBackend {
    factory: SourceFactory,
    opens: Rc<Cell<usize>>,
    open_limit: Option<usize>,
}

impl MemoryBackend {
    pub(crate) fn new(factory: impl Fn() -> ScriptedSource + 'static) -> Self {
        MemoryBackend {
            factory: Box::new(factory),
            opens: Rc::default(),
            open_limit: None,
        }
    }

    /// Let only the first `limit` opens succeed.
    pub(crate) fn failing_after(mut self, limit: usize) -> Self {
        self.open_limit = Some(limit);
        self
    }

    /// Backend serving a finite video, with the log shared by every source it opens.
    pub(crate) fn video(frame_count: u64, fps: f64) -> (Self, Rc<RefCell<SourceLog>>) {
        let log: Rc<RefCell<SourceLog>> = Rc::default();
        let shared = Rc::clone(&log);
        let backend = MemoryBackend::new(move || {
            ScriptedSource::video(frame_count, fps).with_log(Rc::clone(&shared))
        });
        (backend, log)
    }

    pub(crate) fn opens(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.opens)
    }
}

impl MediaBackend for MemoryBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn MediaSource>, MediaError> {
        if let SourceSpec::File(path) = spec {
            let missing = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("missing"));
            if missing {
                return Err(MediaError::Open(format!("{} not found", path.display())));
            }
        }
        if self.open_limit.is_some_and(|limit| self.opens.get() >= limit) {
            return Err(MediaError::Open(format!("{spec} is no longer available")));
        }
        self.opens.set(self.opens.get() + 1);
        Ok(Box::new((self.factory)()))
    }
}
