//! Fisheye View Engine
//!
//! View-transform and playback coordination for fisheye video and images.
//! A frame can be shown as captured, as a steerable rectilinear "anypoint"
//! view, or as a panorama unwrap. This library provides:
//! - Fisheye camera models (Double Sphere, EUCM, Kannala-Brandt) and a lens
//!   model that turns projection parameters into remap tables
//! - A fingerprint cache that rebuilds remap tables only when needed
//! - A playback controller for play, pause, stop, seek and step
//! - The [`ViewEngine`] that ties everything together and publishes the
//!   original, overlay and projected images for each frame

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod lens;
pub mod mapping;
pub mod media;
pub mod playback;
pub mod projection;
pub mod remap;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use camera::{
    CameraModel, CameraModelError, CameraType, DoubleSphereModel, EucmModel, Intrinsics,
    KannalaBrandtModel, Resolution,
};
pub use config::ViewerConfig;
pub use engine::{EngineStatus, TickStatus, ViewEngine};
pub use error::ViewError;
pub use frame::{FrameBundle, FrameProcessor, OverlayStyle};
pub use lens::{CameraLens, LensModel, RemapTables};
pub use mapping::MappingCache;
pub use media::{FileBackend, MediaBackend, MediaSource, SourceKind, SourceSpec};
pub use playback::{PlaybackController, PlaybackState};
pub use projection::{AnypointMode, AnypointPreset, ProjectionState, ViewMode};
