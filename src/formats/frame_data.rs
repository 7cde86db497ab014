//! `FrameData.xml`, the metadata of a single packed sheet
//!
//! ```xml
//! <AnimData>
//!   <FrameWidth>32</FrameWidth>
//!   <FrameHeight>40</FrameHeight>
//!   <ShadowSize>1</ShadowSize>
//!   <Anims>
//!     <Anim>
//!       <Name>Walk</Name>
//!       <Index>0</Index>
//!       <Sequences>
//!         <AnimSequence>
//!           <AnimFrame>
//!             <FrameIndex>0</FrameIndex>
//!             <Duration>8</Duration>
//!             <HFlip>0</HFlip>
//!             <Sprite><XOffset>0</XOffset><YOffset>-1</YOffset></Sprite>
//!             <Shadow><XOffset>0</XOffset><YOffset>4</YOffset></Shadow>
//!           </AnimFrame>
//!         </AnimSequence>
//!       </Sequences>
//!     </Anim>
//!     <Anim><Name>Pose</Name><CopyOf>Walk</CopyOf></Anim>
//!   </Anims>
//! </AnimData>
//! ```

use std::fmt;

use crate::data::{
    fill_directions, resolve_copies, AnimFrame, AnimGroup, AnimationSequence, SequenceFill,
};
use crate::graphics::{atlas::AtlasConfig, geometry::Offset};

use super::{
    xml::{parse_document, write_document, Element},
    parse_duration, FormatError,
};

/// Recoverable problems found while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// The only sequence was copied to every direction
    SingleSequence(String),
    /// Eight empty sequences were created
    NoSequences(String),
    MissingCopySource { name: String, copy_of: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::SingleSequence(name) => {
                write!(f, "{} only has 1 sequence. Duplicating for all directions.", name)
            }
            LoadWarning::NoSequences(name) => {
                write!(f, "{} has no sequences. Generating empty sequences.", name)
            }
            LoadWarning::MissingCopySource { name, copy_of } => {
                write!(f, "Copy source {} of {} not found", copy_of, name)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write aliases as `CopyOf` instead of their inherited frames
    pub trim_copies: bool,
    /// Write a single sequence for groups whose directions are all equal
    pub collapse_singles: bool,
}

impl SaveOptions {
    pub fn from_config(config: &AtlasConfig) -> Self {
        Self {
            trim_copies: config.trim_copies,
            collapse_singles: config.collapse_singles,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameData {
    pub frame_width: u32,
    pub frame_height: u32,
    pub shadow_size: u32,
    pub groups: Vec<AnimGroup>,
}

/// Reads an optional non-negative number. Negative values mean unset.
fn optional_index(element: &Element, name: &str) -> Result<Option<u32>, FormatError> {
    Ok(element
        .child_value::<i64>(name)?
        .and_then(|value| u32::try_from(value).ok()))
}

/// Reads the fields shared by both formats: name, index, alias and key frames.
pub(crate) fn parse_group_header(anim: &Element) -> Result<AnimGroup, FormatError> {
    let name = anim.required("Name")?.text.trim().to_string();
    let idx = optional_index(anim, "Index")?;

    let copy_of = anim
        .child("CopyOf")
        .map(|copy| copy.text.trim())
        .filter(|copy| !copy.is_empty());
    if let Some(copy_of) = copy_of {
        return Ok(AnimGroup::alias(name, idx, copy_of));
    }

    let mut group = AnimGroup::new(name, idx);
    group.rush_frame = optional_index(anim, "RushFrame")?;
    group.hit_frame = optional_index(anim, "HitFrame")?;
    group.return_frame = optional_index(anim, "ReturnFrame")?;
    Ok(group)
}

/// Writes the shared group fields. Returns false when the group was written
/// as a bare alias and needs no frame data.
pub(crate) fn write_group_header(
    anim: &mut Element,
    group: &AnimGroup,
    trim_copies: bool,
    frame_size: Option<(u32, u32)>,
) -> bool {
    anim.push_text("Name", &group.name);
    if let Some(idx) = group.idx {
        anim.push_text("Index", idx);
    }

    if trim_copies {
        if let Some(copy_of) = group.copy_name.as_deref().filter(|name| !name.is_empty()) {
            anim.push_text("CopyOf", copy_of);
            return false;
        }
    }

    if let Some((width, height)) = frame_size {
        anim.push_text("FrameWidth", width);
        anim.push_text("FrameHeight", height);
    }
    for (name, value) in [
        ("RushFrame", group.rush_frame),
        ("HitFrame", group.hit_frame),
        ("ReturnFrame", group.return_frame),
    ] {
        if let Some(value) = value {
            anim.push_text(name, value);
        }
    }
    true
}

/// `HFlip` is normally 0 or 1, but older files carry other text.
fn parse_flip(text: &str) -> bool {
    let text = text.trim();
    text.parse::<i64>()
        .map(|value| value != 0)
        .or_else(|_| text.to_ascii_lowercase().parse::<bool>())
        .unwrap_or(!text.is_empty())
}

fn parse_offset(element: Option<&Element>) -> Result<Offset, FormatError> {
    match element {
        Some(element) => Ok(Offset::new(
            element.required_value("XOffset")?,
            element.required_value("YOffset")?,
        )),
        None => Ok(Offset::ZERO),
    }
}

fn parse_frame(group: &str, idx: usize, element: &Element) -> Result<AnimFrame, FormatError> {
    Ok(AnimFrame {
        idx,
        frame_index: element.required_value("FrameIndex")?,
        flip: element.child("HFlip").is_some_and(|flip| parse_flip(&flip.text)),
        duration: parse_duration(group, element.required("Duration")?)?,
        shadow_offset: parse_offset(element.child("Shadow"))?,
        sprite_offset: parse_offset(element.child("Sprite"))?,
    })
}

fn write_offset(parent: &mut Element, name: &str, offset: Offset) {
    let element = parent.push(Element::new(name));
    element.push_text("XOffset", offset.x);
    element.push_text("YOffset", offset.y);
}

fn write_frame(sequence: &mut Element, frame: &AnimFrame) {
    let element = sequence.push(Element::new("AnimFrame"));
    element.push_text("FrameIndex", frame.frame_index);
    element.push_text("Duration", frame.duration);
    element.push_text("HFlip", u8::from(frame.flip));
    write_offset(element, "Sprite", frame.sprite_offset);
    write_offset(element, "Shadow", frame.shadow_offset);
}

impl FrameData {
    /// Parses `FrameData.xml`.
    ///
    /// Aliases are resolved after every group is read, since they may come
    /// before their source. With `reduce_rush_frames`, offsets after a group's
    /// rush frame are pulled back towards it.
    pub fn from_xml(
        xml: &str,
        reduce_rush_frames: bool,
    ) -> Result<(Self, Vec<LoadWarning>), FormatError> {
        let root = parse_document(xml)?;
        let frame_width = root.required_value("FrameWidth")?;
        let frame_height = root.required_value("FrameHeight")?;
        let shadow_size = root.required_value("ShadowSize")?;
        let anims = root.required("Anims")?;

        let mut warnings = Vec::new();
        let mut groups = Vec::new();

        for anim in anims.children_named("Anim") {
            let mut group = parse_group_header(anim)?;
            if group.is_alias() {
                groups.push(group);
                continue;
            }

            let mut sequences = Vec::new();
            if let Some(element) = anim.child("Sequences") {
                for sequence_element in element.children_named("AnimSequence") {
                    let frames = sequence_element
                        .children_named("AnimFrame")
                        .enumerate()
                        .map(|(idx, frame)| parse_frame(&group.name, idx, frame))
                        .collect::<Result<Vec<_>, _>>()?;
                    let mut sequence = AnimationSequence::from_frames(frames);
                    if let Some(rush) = group.rush_frame.filter(|_| reduce_rush_frames) {
                        sequence.reduce_rush_offsets(rush as usize);
                        sequence.reset_snapshots();
                    }
                    sequences.push(sequence);
                }
            }

            let count = sequences.len();
            let (directions, fill) =
                fill_directions(sequences).ok_or_else(|| FormatError::SequenceCount {
                    group: group.name.clone(),
                    count,
                })?;
            match fill {
                SequenceFill::Duplicated => {
                    warnings.push(LoadWarning::SingleSequence(group.name.clone()))
                }
                SequenceFill::Empty => warnings.push(LoadWarning::NoSequences(group.name.clone())),
                SequenceFill::Complete => {}
            }
            group.directions = directions;
            groups.push(group);
        }

        for name in resolve_copies(&mut groups) {
            let copy_of = groups
                .iter()
                .find(|group| group.name == name)
                .and_then(|group| group.copy_name.clone())
                .unwrap_or_default();
            warnings.push(LoadWarning::MissingCopySource { name, copy_of });
        }

        Ok((
            Self {
                frame_width,
                frame_height,
                shadow_size,
                groups,
            },
            warnings,
        ))
    }

    pub fn to_xml(&self, options: SaveOptions) -> Result<String, FormatError> {
        let mut root = Element::new("AnimData");
        root.push_text("FrameWidth", self.frame_width);
        root.push_text("FrameHeight", self.frame_height);
        root.push_text("ShadowSize", self.shadow_size);
        let anims = root.push(Element::new("Anims"));

        for group in &self.groups {
            let anim = anims.push(Element::new("Anim"));
            if !write_group_header(anim, group, options.trim_copies, None) {
                continue;
            }

            let sequence_count = if options.collapse_singles && group.is_collapsible() {
                1
            } else {
                group.directions.len()
            };
            let sequences = anim.push(Element::new("Sequences"));
            for sequence in group.directions.iter().take(sequence_count) {
                let element = sequences.push(Element::new("AnimSequence"));
                for frame in sequence.iter() {
                    write_frame(element, frame);
                }
            }
        }

        write_document(&root)
    }

    pub fn group(&self, name: &str) -> Option<&AnimGroup> {
        self.groups.iter().find(|group| group.name == name)
    }
}
