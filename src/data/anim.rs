//! Animation metadata model
//!
//! An [`AnimGroup`] is one named action with eight direction sequences. Frames
//! reference cells of a shared atlas by index; the pipeline rewrites those
//! indices whenever the atlas is rebuilt.

use std::fmt;

use crate::data::tracked::Tracked;
use crate::graphics::geometry::Offset;

pub const DIRECTION_COUNT: usize = 8;

/// Facing directions, in the order sequences are stored in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down = 0,
    DownLeft = 1,
    Left = 2,
    UpLeft = 3,
    Up = 4,
    UpRight = 5,
    Right = 6,
    DownRight = 7,
}

impl Direction {
    pub const ALL: [Direction; DIRECTION_COUNT] = [
        Direction::Down,
        Direction::DownLeft,
        Direction::Left,
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
        Direction::Right,
        Direction::DownRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    /// Row of this direction in a per-animation sheet. Sheets list directions
    /// clockwise starting from Down, the reverse of the storage order.
    pub fn sheet_row(self) -> usize {
        (DIRECTION_COUNT - self.index()) % DIRECTION_COUNT
    }

    pub fn from_sheet_row(row: usize) -> Option<Direction> {
        if row >= DIRECTION_COUNT {
            return None;
        }
        Self::from_index((DIRECTION_COUNT - row) % DIRECTION_COUNT)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Down => "Down",
            Direction::DownLeft => "DownLeft",
            Direction::Left => "Left",
            Direction::UpLeft => "UpLeft",
            Direction::Up => "Up",
            Direction::UpRight => "UpRight",
            Direction::Right => "Right",
            Direction::DownRight => "DownRight",
        };
        f.write_str(name)
    }
}

/// One timeline entry of a direction sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimFrame {
    /// Position inside the sequence
    pub idx: usize,
    /// Cell of the shared atlas
    pub frame_index: usize,
    pub flip: bool,
    /// Display time in engine ticks
    pub duration: u32,
    pub shadow_offset: Offset,
    pub sprite_offset: Offset,
}

/// Editable fields of an [`AnimFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    FrameIndex,
    Flip,
    Duration,
    ShadowOffset,
    SpriteOffset,
}

impl AnimFrame {
    /// A fresh frame lasting a single tick, the shortest duration the sheet
    /// formats accept.
    pub fn new(idx: usize, frame_index: usize) -> Self {
        Self {
            idx,
            frame_index,
            duration: 1,
            ..Default::default()
        }
    }

    /// Fields whose value differs from `other`. The sequence position is not an
    /// editable field and is ignored.
    pub fn changed_fields(&self, other: &AnimFrame) -> Vec<FrameField> {
        let mut fields = Vec::new();
        if self.frame_index != other.frame_index {
            fields.push(FrameField::FrameIndex);
        }
        if self.flip != other.flip {
            fields.push(FrameField::Flip);
        }
        if self.duration != other.duration {
            fields.push(FrameField::Duration);
        }
        if self.shadow_offset != other.shadow_offset {
            fields.push(FrameField::ShadowOffset);
        }
        if self.sprite_offset != other.sprite_offset {
            fields.push(FrameField::SpriteOffset);
        }
        fields
    }
}

impl Tracked<AnimFrame> {
    /// Fields edited since the frame was loaded.
    pub fn edited_fields(&self) -> Vec<FrameField> {
        self.value().changed_fields(self.snapshot())
    }
}

/// Ordered frames of one direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSequence {
    pub frames: Vec<Tracked<AnimFrame>>,
}

impl AnimationSequence {
    pub fn from_frames(frames: impl IntoIterator<Item = AnimFrame>) -> Self {
        Self {
            frames: frames.into_iter().map(Tracked::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnimFrame> {
        self.frames.iter().map(|frame| frame.value())
    }

    pub fn durations(&self) -> Vec<u32> {
        self.iter().map(|frame| frame.duration).collect()
    }

    /// Rewrites `idx` to match each frame's position.
    pub fn renumber(&mut self) {
        for (idx, frame) in self.frames.iter_mut().enumerate() {
            frame.value_mut().idx = idx;
        }
    }

    /// Takes the current values as the new "as loaded" state.
    pub fn reset_snapshots(&mut self) {
        for frame in &mut self.frames {
            frame.reset();
        }
    }

    /// Pulls every frame after `rush_frame` a third of the way back towards the
    /// rush frame's sprite and shadow offsets.
    pub fn reduce_rush_offsets(&mut self, rush_frame: usize) {
        let Some(rush) = self.frames.get(rush_frame).map(|frame| *frame.value()) else {
            return;
        };
        for frame in self.frames.iter_mut().skip(rush_frame + 1) {
            let frame = frame.value_mut();
            frame.sprite_offset =
                rush.sprite_offset + (frame.sprite_offset - rush.sprite_offset) / 3;
            frame.shadow_offset =
                rush.shadow_offset + (frame.shadow_offset - rush.shadow_offset) / 3;
        }
    }
}

/// How a loaded list of sequences was turned into eight directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFill {
    Complete,
    /// A single sequence was copied to every direction
    Duplicated,
    /// No sequence was given; eight empty ones were created
    Empty,
}

/// Expands 0, 1 or 8 loaded sequences into a full direction array. Other counts
/// are rejected.
pub fn fill_directions(
    mut sequences: Vec<AnimationSequence>,
) -> Option<([AnimationSequence; DIRECTION_COUNT], SequenceFill)> {
    match sequences.len() {
        0 => Some((Default::default(), SequenceFill::Empty)),
        1 => {
            let only = sequences.remove(0);
            Some((std::array::from_fn(|_| only.clone()), SequenceFill::Duplicated))
        }
        DIRECTION_COUNT => {
            let directions: [AnimationSequence; DIRECTION_COUNT] = sequences.try_into().ok()?;
            Some((directions, SequenceFill::Complete))
        }
        _ => None,
    }
}

/// A named animation action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimGroup {
    /// Engine action id
    pub idx: Option<u32>,
    pub name: String,
    pub rush_frame: Option<u32>,
    pub hit_frame: Option<u32>,
    pub return_frame: Option<u32>,
    pub directions: [AnimationSequence; DIRECTION_COUNT],
    /// Name of the group this one aliases. Frame data is inherited until an edit
    /// materialises it.
    pub copy_name: Option<String>,
    pub modified: bool,
}

impl AnimGroup {
    pub fn new(name: impl Into<String>, idx: Option<u32>) -> Self {
        Self {
            name: name.into(),
            idx,
            ..Default::default()
        }
    }

    pub fn alias(name: impl Into<String>, idx: Option<u32>, copy_of: impl Into<String>) -> Self {
        Self {
            copy_name: Some(copy_of.into()),
            ..Self::new(name, idx)
        }
    }

    pub fn is_alias(&self) -> bool {
        self.copy_name.as_deref().is_some_and(|name| !name.is_empty())
    }

    pub fn sequence(&self, direction: Direction) -> &AnimationSequence {
        &self.directions[direction.index()]
    }

    /// True when all eight directions hold identical frames, so a single
    /// direction is enough to store the group.
    pub fn is_collapsible(&self) -> bool {
        let first = &self.directions[0];
        self.directions.iter().all(|sequence| sequence == first)
    }

    pub fn max_frame_count(&self) -> usize {
        self.directions.iter().map(AnimationSequence::len).max().unwrap_or(0)
    }

    pub fn reset_snapshots(&mut self) {
        for sequence in &mut self.directions {
            sequence.reset_snapshots();
        }
    }

    /// Records a direct edit of frame data. The group stops being an alias.
    fn touch(&mut self, direction: Direction) {
        self.copy_name = None;
        self.modified = true;
        self.directions[direction.index()].renumber();
    }

    /// Appends a new frame showing atlas cell `frame_index`.
    pub fn push_frame(&mut self, direction: Direction, frame_index: usize) {
        let sequence = &mut self.directions[direction.index()];
        let frame = AnimFrame::new(sequence.len(), frame_index);
        sequence.frames.push(Tracked::new(frame));
        self.touch(direction);
    }

    /// Inserts a copy of the frame at `position` right after it.
    pub fn duplicate_frame(&mut self, direction: Direction, position: usize) -> bool {
        let sequence = &mut self.directions[direction.index()];
        let Some(frame) = sequence.frames.get(position).map(|frame| *frame.value()) else {
            return false;
        };
        sequence.frames.insert(position + 1, Tracked::new(frame));
        self.touch(direction);
        true
    }

    /// Removes the frames at the given positions. Unknown positions are ignored.
    pub fn remove_frames(&mut self, direction: Direction, positions: &[usize]) {
        let sequence = &mut self.directions[direction.index()];
        let mut position = 0;
        sequence.frames.retain(|_| {
            let keep = !positions.contains(&position);
            position += 1;
            keep
        });
        self.touch(direction);
    }

    /// Moves a frame one slot earlier (`up`) or later. Returns false when the frame
    /// is already at that end of the sequence.
    pub fn move_frame(&mut self, direction: Direction, position: usize, up: bool) -> bool {
        let sequence = &mut self.directions[direction.index()];
        let target = if up {
            position.checked_sub(1)
        } else {
            Some(position + 1)
        };
        match target {
            Some(target) if target < sequence.len() && position < sequence.len() => {
                sequence.frames.swap(position, target);
                self.touch(direction);
                true
            }
            _ => false,
        }
    }

    /// Edits one frame in place.
    pub fn edit_frame(
        &mut self,
        direction: Direction,
        position: usize,
        edit: impl FnOnce(&mut AnimFrame),
    ) -> bool {
        let Some(frame) = self.directions[direction.index()].frames.get_mut(position) else {
            return false;
        };
        edit(frame.value_mut());
        self.touch(direction);
        true
    }

    /// Restores a frame to its loaded values.
    pub fn revert_frame(&mut self, direction: Direction, position: usize) -> bool {
        let Some(frame) = self.directions[direction.index()].frames.get_mut(position) else {
            return false;
        };
        frame.revert();
        self.touch(direction);
        true
    }

    /// Replaces a whole direction, e.g. when pasting a copied sequence.
    pub fn replace_sequence(&mut self, direction: Direction, sequence: &AnimationSequence) {
        self.directions[direction.index()] = AnimationSequence::from_frames(sequence.iter().copied());
        self.touch(direction);
    }
}

/// Fills every alias from the group it names. Aliases may appear before their
/// source. Returns the names of aliases whose source does not exist; those are
/// left untouched.
pub fn resolve_copies(groups: &mut [AnimGroup]) -> Vec<String> {
    let mut unresolved = Vec::new();

    for alias_idx in 0..groups.len() {
        let Some(copy_name) = groups[alias_idx].copy_name.clone().filter(|n| !n.is_empty()) else {
            continue;
        };
        let source = groups
            .iter()
            .find(|group| group.name == copy_name)
            .map(|group| {
                (
                    group.rush_frame,
                    group.hit_frame,
                    group.return_frame,
                    group.directions.clone(),
                )
            });

        match source {
            Some((rush_frame, hit_frame, return_frame, directions)) => {
                let alias = &mut groups[alias_idx];
                alias.rush_frame = rush_frame;
                alias.hit_frame = hit_frame;
                alias.return_frame = return_frame;
                alias.directions = directions;
            }
            None => unresolved.push(groups[alias_idx].name.clone()),
        }
    }

    unresolved
}

/// Copies group `source` under a new name. The copy is a full group, not an alias.
pub fn duplicate_group(groups: &mut Vec<AnimGroup>, source: &str, new_name: &str) -> bool {
    let Some(mut copy) = groups.iter().find(|group| group.name == source).cloned() else {
        return false;
    };
    copy.name = new_name.to_string();
    copy.idx = None;
    copy.copy_name = None;
    copy.modified = true;
    groups.push(copy);
    true
}

/// Removes a group by name.
pub fn remove_group(groups: &mut Vec<AnimGroup>, name: &str) -> Option<AnimGroup> {
    let position = groups.iter().position(|group| group.name == name)?;
    Some(groups.remove(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(idx: usize, frame_index: usize, duration: u32) -> AnimFrame {
        AnimFrame {
            idx,
            frame_index,
            duration,
            ..Default::default()
        }
    }

    fn group_with_all_directions(frames: &[AnimFrame]) -> AnimGroup {
        let mut group = AnimGroup::new("Walk", Some(0));
        for sequence in &mut group.directions {
            *sequence = AnimationSequence::from_frames(frames.iter().copied());
        }
        group
    }

    #[test]
    fn test_sheet_rows_run_clockwise() {
        assert_eq!(Direction::Down.sheet_row(), 0);
        assert_eq!(Direction::DownRight.sheet_row(), 1);
        assert_eq!(Direction::Right.sheet_row(), 2);
        assert_eq!(Direction::DownLeft.sheet_row(), 7);
        for direction in Direction::ALL {
            assert_eq!(Direction::from_sheet_row(direction.sheet_row()), Some(direction));
        }
    }

    #[test]
    fn test_collapsible_detection() {
        let mut group = group_with_all_directions(&[frame(0, 1, 4), frame(1, 2, 4)]);
        assert!(group.is_collapsible());

        group.edit_frame(Direction::UpLeft, 1, |f| f.frame_index = 9);
        assert!(!group.is_collapsible());
    }

    #[test]
    fn test_collapsible_ignores_snapshots() {
        let mut group = group_with_all_directions(&[frame(0, 1, 4)]);
        group.edit_frame(Direction::Left, 0, |f| f.duration = 8);
        group.edit_frame(Direction::Left, 0, |f| f.duration = 4);
        assert!(group.is_collapsible());
    }

    #[test]
    fn test_edit_clears_alias_and_marks_modified() {
        let mut group = AnimGroup::alias("Pose", None, "Idle");
        assert!(group.is_alias());
        group.push_frame(Direction::Down, 3);
        assert!(!group.is_alias());
        assert!(group.modified);
        assert_eq!(group.sequence(Direction::Down).len(), 1);
        assert_eq!(group.sequence(Direction::Down).frames[0].value().duration, 1);
    }

    #[test]
    fn test_duplicate_and_remove_frames_renumber() {
        let mut group = AnimGroup::new("Attack", Some(5));
        group.push_frame(Direction::Down, 0);
        group.push_frame(Direction::Down, 1);
        assert!(group.duplicate_frame(Direction::Down, 0));
        let indices: Vec<_> = group.sequence(Direction::Down).iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, vec![0, 0, 1]);

        group.remove_frames(Direction::Down, &[0]);
        let idxs: Vec<_> = group.sequence(Direction::Down).iter().map(|f| f.idx).collect();
        assert_eq!(idxs, vec![0, 1]);
    }

    #[test]
    fn test_move_frame_bounds() {
        let mut group = AnimGroup::new("Attack", None);
        group.push_frame(Direction::Down, 10);
        group.push_frame(Direction::Down, 11);
        assert!(!group.move_frame(Direction::Down, 0, true));
        assert!(group.move_frame(Direction::Down, 0, false));
        let indices: Vec<_> = group.sequence(Direction::Down).iter().map(|f| f.frame_index).collect();
        assert_eq!(indices, vec![11, 10]);
        assert!(!group.move_frame(Direction::Down, 1, false));
    }

    #[test]
    fn test_revert_frame_and_edited_fields() {
        let mut group = group_with_all_directions(&[frame(0, 1, 4)]);
        group.edit_frame(Direction::Down, 0, |f| {
            f.duration = 9;
            f.flip = true;
        });
        let edited = group.sequence(Direction::Down).frames[0].edited_fields();
        assert_eq!(edited, vec![FrameField::Flip, FrameField::Duration]);

        group.revert_frame(Direction::Down, 0);
        assert!(!group.sequence(Direction::Down).frames[0].changed());
    }

    #[test]
    fn test_fill_directions() {
        let one = vec![AnimationSequence::from_frames([frame(0, 3, 2)])];
        let (directions, fill) = fill_directions(one).unwrap();
        assert_eq!(fill, SequenceFill::Duplicated);
        assert!(directions.iter().all(|s| s.len() == 1));

        let (directions, fill) = fill_directions(Vec::new()).unwrap();
        assert_eq!(fill, SequenceFill::Empty);
        assert!(directions.iter().all(AnimationSequence::is_empty));

        assert!(fill_directions(vec![AnimationSequence::default(); 3]).is_none());
    }

    #[test]
    fn test_resolve_copies_in_any_order() {
        let mut groups = vec![
            AnimGroup::alias("Pose", Some(2), "Idle"),
            group_with_all_directions(&[frame(0, 7, 3)]),
            AnimGroup::alias("Lost", None, "Missing"),
        ];
        groups[1].name = "Idle".to_string();
        groups[1].hit_frame = Some(0);

        let unresolved = resolve_copies(&mut groups);
        assert_eq!(unresolved, vec!["Lost".to_string()]);
        assert_eq!(groups[0].directions, groups[1].directions);
        assert_eq!(groups[0].hit_frame, Some(0));
        assert!(groups[0].is_alias());
        assert!(groups[2].directions.iter().all(AnimationSequence::is_empty));
    }

    #[test]
    fn test_reduce_rush_offsets() {
        let mut sequence = AnimationSequence::from_frames([
            AnimFrame {
                sprite_offset: Offset::new(0, 0),
                ..frame(0, 0, 2)
            },
            AnimFrame {
                sprite_offset: Offset::new(3, 0),
                ..frame(1, 0, 2)
            },
            AnimFrame {
                sprite_offset: Offset::new(9, -4),
                shadow_offset: Offset::new(-6, 0),
                ..frame(2, 0, 2)
            },
        ]);
        sequence.reduce_rush_offsets(1);
        let offsets: Vec<_> = sequence.iter().map(|f| f.sprite_offset).collect();
        assert_eq!(offsets, vec![Offset::new(0, 0), Offset::new(3, 0), Offset::new(5, -2)]);
        assert_eq!(sequence.frames[2].shadow_offset, Offset::new(-2, 0));
    }

    #[test]
    fn test_group_duplication() {
        let mut groups = vec![group_with_all_directions(&[frame(0, 1, 2)])];
        assert!(duplicate_group(&mut groups, "Walk", "Walk2"));
        assert!(!duplicate_group(&mut groups, "Nope", "X"));
        assert_eq!(groups[1].directions, groups[0].directions);
        assert!(remove_group(&mut groups, "Walk").is_some());
        assert_eq!(groups.len(), 1);
    }
}
