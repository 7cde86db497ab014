//! Animation metadata file formats
//!
//! `FrameData.xml` describes a single packed sheet; `AnimData.xml` describes a
//! directory of per-animation sheets.

use thiserror::Error;

pub mod anim_data;
pub mod frame_data;
pub mod xml;

pub use anim_data::{AnimData, AnimDataEntry};
pub use frame_data::{FrameData, LoadWarning, SaveOptions};

use xml::Element;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Failed to parse animations XML data: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML document is empty")]
    EmptyDocument,
    #[error("Missing <{element}> in <{parent}>")]
    MissingElement { parent: String, element: String },
    #[error("Invalid value {value:?} in <{element}>")]
    InvalidValue { element: String, value: String },
    #[error("{group} animation has invalid duration value {value}")]
    InvalidDuration { group: String, value: i64 },
    #[error("{group} has {count} sequences, expected 0, 1 or 8")]
    SequenceCount { group: String, count: usize },
    #[error("All directions for animation {group} must have the same number of frames")]
    FrameCountMismatch { group: String },
    #[error("Duration values for {group} must match for all directions for each frame")]
    DurationMismatch { group: String },
}

/// Reads a `<Duration>` element. Durations count engine ticks and must be
/// positive.
pub(crate) fn parse_duration(group: &str, element: &Element) -> Result<u32, FormatError> {
    let value: i64 = element.value()?;
    u32::try_from(value)
        .ok()
        .filter(|&value| value > 0)
        .ok_or_else(|| FormatError::InvalidDuration {
            group: group.to_string(),
            value,
        })
}
