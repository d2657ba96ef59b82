// src/lib.rs

//! Detection-overlay rendering for alert snapshots.
//!
//! Takes a decoded camera frame plus whatever detection metadata the alert
//! carries (modern annotations payload or legacy box lists, in any of three
//! box encodings) and paints bounding boxes, identity-colored labels,
//! movement trajectories, and configured crossing lines onto a host-supplied
//! drawing surface.
//!
//! The core is pure: no I/O, no clock, no network. [`OverlayRenderer::render`]
//! never returns an error; malformed records are skipped and failing drawing
//! stages are logged and dropped so a partial overlay always beats a missing
//! snapshot. One CPU raster backend, [`RasterSurface`], ships with the crate;
//! anything else can implement [`DrawSurface`].

pub mod adapter;
pub mod filter;
pub mod geom;
pub mod overlay;
pub mod palette;
pub mod surface;
pub mod trajectory;
pub mod types;

pub use overlay::{OverlayRenderer, DEFAULT_DIMS};
pub use palette::{class_color, ColorRegistry, PALETTE};
pub use surface::{load_font, DrawSurface, RasterSurface};
pub use types::{
    AnnotationsData, AnnotationsMetadata, AnnotationsPayload, Color, DetectionRecord,
    DetectionStats, Frame, LegacyBox, LegacyMetadata, LineAnnotation, LineCrossingConfig,
    PixelBox, Point, RawDetection, RenderOptions,
};
