//! Fingerprint-keyed cache of remap tables.
//!
//! Table generation is expensive compared to resampling a frame, so tables
//! are only rebuilt when something that affects them changes: the projection
//! mode, the active mode's parameters, the calibration, or the frame size.
//! Each projection keeps its own slot, which makes toggling between modes
//! with unchanged parameters free.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::camera::Resolution;
use crate::error::ViewError;
use crate::lens::{LensError, LensModel, RemapTables};
use crate::projection::{ActiveProjection, AnypointMode, ProjectionState, ViewMode};

/// Everything that determines the content of a pair of remap tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    mode: ViewMode,
    params: Vec<u64>,
    calibration_id: String,
    frame: Resolution,
}

impl Fingerprint {
    pub fn new(state: &ProjectionState, calibration_id: &str, frame: Resolution) -> Self {
        // -0.0 and 0.0 describe the same view
        let bits = |v: f64| (v + 0.0).to_bits();
        let params = match state.active() {
            ActiveProjection::Fisheye => Vec::new(),
            ActiveProjection::Anypoint(p) => match p.mode {
                AnypointMode::Mode1 => vec![1, bits(p.alpha), bits(p.beta), bits(p.zoom)],
                AnypointMode::Mode2 => {
                    vec![2, bits(p.alpha), bits(p.beta), bits(p.roll), bits(p.zoom)]
                }
            },
            ActiveProjection::Panorama(p) => vec![bits(p.alpha_min), bits(p.alpha_max)],
        };
        Fingerprint {
            mode: state.mode,
            params,
            calibration_id: calibration_id.to_string(),
            frame,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: Fingerprint,
    tables: RemapTables,
}

#[derive(Debug, Clone, Default)]
pub struct MappingCache {
    slots: HashMap<ViewMode, CacheEntry>,
    recomputes: usize,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables for the active projection of `state`, rebuilt only when the
    /// fingerprint changed since the last call for that mode.
    ///
    /// Fisheye mode needs no tables and returns `Ok(None)`. A failed rebuild
    /// leaves the cached tables untouched.
    pub fn ensure_current(
        &mut self,
        state: &ProjectionState,
        lens: Option<&dyn LensModel>,
        frame: Resolution,
    ) -> Result<Option<&RemapTables>, ViewError> {
        if state.mode == ViewMode::Fisheye {
            return Ok(None);
        }
        let lens = lens.ok_or_else(|| {
            ViewError::RecoverableConfig(format!("{} view needs a calibration", state.mode))
        })?;

        let fingerprint = Fingerprint::new(state, lens.calibration_id(), frame);
        let hit = self
            .slots
            .get(&state.mode)
            .is_some_and(|entry| entry.fingerprint == fingerprint);

        if hit {
            debug!("{} remap tables are current", state.mode);
        } else {
            let tables = compute_tables(state, lens, frame).map_err(|err| {
                warn!("Keeping previous {} remap tables: {err}", state.mode);
                ViewError::from(err)
            })?;
            self.recomputes += 1;
            info!(
                "Recomputed {} remap tables for {frame} with {}",
                state.mode,
                lens.calibration_id()
            );
            self.slots
                .insert(state.mode, CacheEntry { fingerprint, tables });
        }

        Ok(self.slots.get(&state.mode).map(|entry| &entry.tables))
    }

    /// Ask `lens` whether it accepts the active parameters of `state`, without
    /// caching anything. Used while no frame size is known yet; the tables
    /// are built at a single pixel.
    pub fn validate(state: &ProjectionState, lens: Option<&dyn LensModel>) -> Result<(), ViewError> {
        if state.mode == ViewMode::Fisheye {
            return Ok(());
        }
        let lens = lens.ok_or_else(|| {
            ViewError::RecoverableConfig(format!("{} view needs a calibration", state.mode))
        })?;
        compute_tables(state, lens, Resolution::new(1, 1))?;
        Ok(())
    }

    /// Cached tables for `mode`, if any, without checking freshness.
    pub fn tables(&self, mode: ViewMode) -> Option<&RemapTables> {
        self.slots.get(&mode).map(|entry| &entry.tables)
    }

    /// Drop every cached table, e.g. after a calibration change.
    pub fn invalidate(&mut self) {
        if !self.slots.is_empty() {
            debug!("Invalidating {} cached remap table pairs", self.slots.len());
        }
        self.slots.clear();
    }

    /// Number of table rebuilds performed so far.
    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }
}

fn compute_tables(
    state: &ProjectionState,
    lens: &dyn LensModel,
    frame: Resolution,
) -> Result<RemapTables, LensError> {
    match state.active() {
        ActiveProjection::Fisheye => Err(LensError::InvalidParameter(
            "fisheye view has no remap tables".to_string(),
        )),
        ActiveProjection::Anypoint(p) => match p.mode {
            AnypointMode::Mode1 => lens.anypoint(p.alpha, p.beta, p.zoom, p.mode.index(), frame),
            AnypointMode::Mode2 => lens.anypoint_car(p.alpha, p.beta, p.roll, p.zoom, frame),
        },
        ActiveProjection::Panorama(p) => lens.panorama(p.alpha_min, p.alpha_max, frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CountingLens;

    const FRAME: Resolution = Resolution {
        width: 32,
        height: 24,
    };

    #[test]
    fn test_fisheye_needs_no_tables() {
        let mut cache = MappingCache::new();
        let state = ProjectionState::new();
        assert!(cache.ensure_current(&state, None, FRAME).unwrap().is_none());
        assert_eq!(cache.recompute_count(), 0);
    }

    #[test]
    fn test_ensure_current_is_idempotent() {
        let lens = CountingLens::new("lens-a");
        let mut cache = MappingCache::new();
        let mut state = ProjectionState::new();
        state.set_mode(ViewMode::Anypoint);

        let first = cache
            .ensure_current(&state, Some(&lens), FRAME)
            .unwrap()
            .cloned();
        let second = cache
            .ensure_current(&state, Some(&lens), FRAME)
            .unwrap()
            .cloned();

        assert_eq!(first, second);
        assert_eq!(first.map(|t| t.resolution()), Some(FRAME));
        assert_eq!(lens.calls(), 1);
        assert_eq!(cache.recompute_count(), 1);
    }

    #[test]
    fn test_mode_round_trip_reuses_tables() {
        let lens = CountingLens::new("lens-a");
        let mut cache = MappingCache::new();
        let mut state = ProjectionState::new();

        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        state.set_mode(ViewMode::Anypoint);
        state.set_anypoint_params(10.0, 20.0, 0.0, 2.0);
        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        state.set_mode(ViewMode::Fisheye);
        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        state.set_mode(ViewMode::Anypoint);
        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();

        assert_eq!(
            (state.anypoint.alpha, state.anypoint.beta, state.anypoint.zoom),
            (10.0, 20.0, 2.0)
        );
        assert_eq!(lens.calls(), 1);
    }

    #[test]
    fn test_fingerprint_changes_trigger_recompute() {
        let lens = CountingLens::new("lens-a");
        let other = CountingLens::new("lens-b");
        let mut cache = MappingCache::new();
        let mut state = ProjectionState::new();
        state.set_mode(ViewMode::Panorama);

        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        state.set_panorama_params(100.0, 20.0);
        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        cache
            .ensure_current(&state, Some(&lens), Resolution::new(16, 12))
            .unwrap();
        cache.ensure_current(&state, Some(&other), Resolution::new(16, 12)).unwrap();

        assert_eq!(lens.calls(), 3);
        assert_eq!(other.calls(), 1);
        assert_eq!(cache.recompute_count(), 4);
    }

    #[test]
    fn test_roll_ignored_in_first_submode() {
        let mut state = ProjectionState::new();
        state.set_mode(ViewMode::Anypoint);
        let a = Fingerprint::new(&state, "id", FRAME);
        state.anypoint.roll = 30.0;
        assert_eq!(a, Fingerprint::new(&state, "id", FRAME));

        state.set_anypoint_submode(AnypointMode::Mode2);
        let b = Fingerprint::new(&state, "id", FRAME);
        state.anypoint.roll = 30.0;
        assert_ne!(b, Fingerprint::new(&state, "id", FRAME));
    }

    #[test]
    fn test_failure_keeps_previous_tables() {
        let lens = CountingLens::new("lens-a");
        let mut cache = MappingCache::new();
        let mut state = ProjectionState::new();
        state.set_mode(ViewMode::Anypoint);
        let good = cache
            .ensure_current(&state, Some(&lens), FRAME)
            .unwrap()
            .cloned();

        state.set_anypoint_params(0.0, 0.0, 0.0, -1.0);
        let err = cache.ensure_current(&state, Some(&lens), FRAME).unwrap_err();
        assert!(matches!(err, ViewError::InvalidProjectionParameter(_)));
        assert_eq!(cache.tables(ViewMode::Anypoint).cloned(), good);
        assert_eq!(cache.recompute_count(), 1);
    }

    #[test]
    fn test_validate_without_frame() {
        let lens = CountingLens::new("lens-a");
        let mut state = ProjectionState::new();
        assert!(MappingCache::validate(&state, None).is_ok());

        state.set_mode(ViewMode::Anypoint);
        assert!(MappingCache::validate(&state, Some(&lens)).is_ok());
        state.set_anypoint_params(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            MappingCache::validate(&state, Some(&lens)),
            Err(ViewError::InvalidProjectionParameter(_))
        ));
        assert!(matches!(
            MappingCache::validate(&state, None),
            Err(ViewError::RecoverableConfig(_))
        ));
    }

    #[test]
    fn test_missing_calibration_and_invalidate() {
        let lens = CountingLens::new("lens-a");
        let mut cache = MappingCache::new();
        let mut state = ProjectionState::new();
        state.set_mode(ViewMode::Panorama);
        assert!(matches!(
            cache.ensure_current(&state, None, FRAME),
            Err(ViewError::RecoverableConfig(_))
        ));

        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        cache.invalidate();
        assert!(cache.tables(ViewMode::Panorama).is_none());
        cache.ensure_current(&state, Some(&lens), FRAME).unwrap();
        assert_eq!(lens.calls(), 2);
    }
}
