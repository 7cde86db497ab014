//! Packing and splitting of directional sprite animation sheets.
//!
//! Many per-animation sheets (one row per direction, attachment points drawn
//! as coloured marker pixels) are packed into one atlas of unique frames, with
//! mirrored copies stored once and drawn flipped. Splitting reverses this.

pub mod data;
pub mod formats;
pub mod graphics;
pub mod playback;
pub mod progress;
pub mod project;

pub use data::{AnimFrame, AnimGroup, AnimationSequence, Direction, Tracked};
pub use formats::{AnimData, FormatError, FrameData};
pub use graphics::{AtlasConfig, AtlasError};
pub use project::{export_multi_sheet, import_multi_sheet, pack_directory, SingleSheet};
