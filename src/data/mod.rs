//! Animation metadata shared by the editor and the sheet pipeline

pub mod anim;
pub mod tracked;

pub use anim::{
    duplicate_group, fill_directions, remove_group, resolve_copies, AnimFrame, AnimGroup,
    AnimationSequence, Direction, FrameField, SequenceFill, DIRECTION_COUNT,
};
pub use tracked::Tracked;
