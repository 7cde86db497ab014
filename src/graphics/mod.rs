//! Graphics processing for animation sheets
//!
//! Geometry, attachment point markers and the atlas pipeline that packs
//! per-animation sheets into one deduplicated atlas and back.

pub mod atlas;
pub mod geometry;
pub mod markers;

pub use atlas::{AtlasConfig, AtlasError, GroupSheets};
pub use geometry::{Offset, Rectangle, TLRectangle};
pub use markers::{ActionPoints, HandRoles, MarkerError, RowOrder};
