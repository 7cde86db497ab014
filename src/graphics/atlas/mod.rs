//! Sprite Atlas Generation
//!
//! Packs many per-animation sheets into one deduplicated atlas and splits an
//! atlas back into per-animation sheets.

use std::{fs, io, path::Path};

use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, ImageError, RgbaImage};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{resolve_copies, AnimGroup, Direction, DIRECTION_COUNT};
use crate::formats::FormatError;
use crate::graphics::markers::{ActionPoints, HandRoles, MarkerError, RowOrder};

pub mod analyser;
pub mod generator;
pub mod splitter;

use analyser::analyse_group_sheet;
use generator::{deduplicate_frames, pack_frames, FrameSource};

/// Configuration options for packing and splitting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Rounding quantum for packed atlas cells
    pub pack_quantum: u32,
    /// Rounding quantum for split sheet cells
    pub split_quantum: u32,
    /// Only merge frames whose attachment points also match
    pub check_action_points: bool,
    /// Write groups with eight identical directions as a single row
    pub collapse_singles: bool,
    /// Write alias groups as `CopyOf` only
    pub trim_copies: bool,
    pub hand_roles: HandRoles,
    /// Scan order of single-sheet offsets images
    pub row_order: RowOrder,
    pub reduce_rush_frames: bool,
    /// Re-encode written PNGs with oxipng
    pub optimise_png: bool,
    /// Dump every unique frame next to the packed atlas
    pub debug: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            pack_quantum: 2,
            split_quantum: 8,
            check_action_points: true,
            collapse_singles: true,
            trim_copies: true,
            hand_roles: HandRoles::default(),
            row_order: RowOrder::default(),
            reduce_rush_frames: false,
            optimise_png: true,
            debug: false,
        }
    }
}

impl AtlasConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, AtlasError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AtlasError> {
        check_quantum("pack_quantum", self.pack_quantum)?;
        check_quantum("split_quantum", self.split_quantum)
    }
}

pub(crate) fn check_quantum(name: &str, quantum: u32) -> Result<(), AtlasError> {
    if quantum == 0 {
        return Err(AtlasError::InvalidConfig(format!(
            "{} must be at least 1",
            name
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{name}: {reason}")]
    MalformedAsset { name: String, reason: String },
    #[error("Error decoding action points of {group}, direction {direction}, frame {frame}: {source}")]
    MarkerDecode {
        group: String,
        direction: Direction,
        frame: usize,
        #[source]
        source: MarkerError,
    },
    #[error("Error decoding action points of sheet frame {frame_index}: {source}")]
    AtlasMarkerDecode {
        frame_index: usize,
        #[source]
        source: MarkerError,
    },
    #[error("No valid frames found for atlas generation")]
    NoFramesFound,
    #[error("PNG optimisation failed: {0}")]
    PngOptimise(String),
    #[error("{group} uses sheet frame {frame_index} but the sheet only has {available}")]
    FrameOutOfRange {
        group: String,
        frame_index: usize,
        available: usize,
    },
}

impl AtlasError {
    pub fn malformed(name: &str, reason: impl Into<String>) -> Self {
        AtlasError::MalformedAsset {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// The three images authored for one animation group
#[derive(Debug, Clone)]
pub struct GroupSheets {
    pub anim: RgbaImage,
    pub offsets: RgbaImage,
    /// Without a shadow sheet the shadow anchor is derived from the frame bounds
    pub shadow: Option<RgbaImage>,
}

/// One group to be packed
#[derive(Debug, Clone)]
pub struct GroupInput {
    /// Name, index, key frames and alias; directions are filled while packing
    pub group: AnimGroup,
    /// `None` for aliases
    pub sheets: Option<GroupSheets>,
    pub frame_size: (u32, u32),
    pub durations: Vec<u32>,
}

/// The packed result of a set of groups
#[derive(Debug)]
pub struct PackedGroups {
    pub atlas: RgbaImage,
    pub offsets: RgbaImage,
    pub frame_size: (u32, u32),
    pub groups: Vec<AnimGroup>,
    pub unique_frames: Vec<RgbaImage>,
    pub unique_points: Vec<ActionPoints>,
    /// Aliases whose source group does not exist
    pub unresolved: Vec<String>,
}

struct FrameLocation {
    group: usize,
    direction: Direction,
    position: usize,
    odd_width: bool,
}

/// Packs every group's sheets into a single deduplicated atlas and rewrites
/// the frame indices to point into it.
pub fn pack_groups(
    inputs: Vec<GroupInput>,
    config: &AtlasConfig,
) -> Result<PackedGroups, AtlasError> {
    config.validate()?;
    let mut groups = Vec::with_capacity(inputs.len());
    let mut sources = Vec::new();
    let mut locations = Vec::new();
    let mut collapsed = Vec::new();

    for input in inputs {
        let mut group = input.group;
        let sheets = match input.sheets {
            Some(sheets) if !group.is_alias() => sheets,
            _ => {
                groups.push(group);
                continue;
            }
        };

        let (frame_width, frame_height) = input.frame_size;
        let analysis = analyse_group_sheet(
            &group.name,
            &sheets,
            frame_width,
            frame_height,
            &input.durations,
            config,
        )?;

        if analysis.is_collapsed() {
            collapsed.push(groups.len());
        }

        for frame in analysis.frames {
            group.directions[frame.direction.index()]
                .frames
                .push(frame.frame.into());
            locations.push(FrameLocation {
                group: groups.len(),
                direction: frame.direction,
                position: frame.position,
                odd_width: frame.image.width() % 2 == 1,
            });
            sources.push(FrameSource {
                image: frame.image,
                points: frame.points,
            });
        }
        groups.push(group);
    }

    if sources.is_empty() {
        return Err(AtlasError::NoFramesFound);
    }
    info!("Analysis complete: {} original frames found", sources.len());

    let deduplicated = deduplicate_frames(&sources, config.check_action_points);
    info!(
        "Deduplication result: {} unique frames (reduced from {})",
        deduplicated.unique_images.len(),
        sources.len()
    );

    let packed = pack_frames(
        &deduplicated.unique_images,
        &deduplicated.unique_points,
        config.pack_quantum,
        config.hand_roles,
    )?;
    info!(
        "Atlas layout created: {}x{} grid of {}x{} cells",
        packed.layout.frames_per_row,
        packed.layout.rows,
        packed.layout.frame_size.0,
        packed.layout.frame_size.1
    );

    for (location, remap) in locations.iter().zip(&deduplicated.remap) {
        let sequence = &mut groups[location.group].directions[location.direction.index()];
        if let Some(frame) = sequence.frames.get_mut(location.position) {
            let frame = frame.value_mut();
            frame.frame_index = remap.frame_index;
            frame.flip = remap.flip;
            if remap.flip && location.odd_width {
                frame.sprite_offset.x += 1;
            }
        }
    }

    for &index in &collapsed {
        let group = &mut groups[index];
        let down = group.directions[Direction::Down.index()].clone();
        for direction in 1..DIRECTION_COUNT {
            group.directions[direction] = down.clone();
        }
    }

    let unresolved = resolve_copies(&mut groups);
    for name in &unresolved {
        warn!("Copy source of {} not found", name);
    }

    for group in &mut groups {
        group.reset_snapshots();
    }

    Ok(PackedGroups {
        atlas: packed.atlas,
        offsets: packed.offsets,
        frame_size: packed.layout.frame_size,
        groups,
        unique_frames: deduplicated.unique_images,
        unique_points: deduplicated.unique_points,
        unresolved,
    })
}

/// Encodes an image as PNG, optionally squeezed losslessly through oxipng.
pub fn encode_png(image: &RgbaImage, config: &AtlasConfig) -> Result<Vec<u8>, AtlasError> {
    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;

    if !config.optimise_png {
        return Ok(data);
    }

    let options = oxipng::Options::from_preset(2);
    match oxipng::optimize_from_memory(&data, &options) {
        Ok(optimised) => {
            debug!(
                "PNG optimised from {} to {} bytes",
                data.len(),
                optimised.len()
            );
            Ok(optimised)
        }
        Err(e) => {
            warn!("{}", AtlasError::PngOptimise(e.to_string()));
            Ok(data)
        }
    }
}

/// Writes an image to `path` as PNG.
pub fn save_png(image: &RgbaImage, path: &Path, config: &AtlasConfig) -> Result<(), AtlasError> {
    let data = encode_png(image, config)?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::markers::{BLUE, GREEN, RED, WHITE};
    use image::Rgba;

    const BODY: Rgba<u8> = Rgba([90, 140, 200, 255]);

    /// Two 16x16 frames in one row: a 3x4 block and its mirror image.
    fn mirrored_pair() -> GroupSheets {
        let mut anim = RgbaImage::new(32, 16);
        let mut offsets = RgbaImage::new(32, 16);
        let mut shadow = RgbaImage::new(32, 16);
        for (cell_x, marked_column) in [(0, 6), (16, 8)] {
            for y in 6..10 {
                for x in 6..9 {
                    anim.put_pixel(cell_x + x, y, BODY);
                }
                anim.put_pixel(cell_x + marked_column, y, Rgba([5, 5, 5, 255]));
            }
            offsets.put_pixel(cell_x + 7, 8, GREEN);
            shadow.put_pixel(cell_x + 8, 12, WHITE);
        }
        // Hands swap sides in the mirror.
        offsets.put_pixel(6, 7, RED);
        offsets.put_pixel(8, 7, BLUE);
        offsets.put_pixel(16 + 8, 7, RED);
        offsets.put_pixel(16 + 6, 7, BLUE);
        GroupSheets {
            anim,
            offsets,
            shadow: Some(shadow),
        }
    }

    fn input(name: &str, sheets: Option<GroupSheets>) -> GroupInput {
        GroupInput {
            group: AnimGroup::new(name, Some(0)),
            sheets,
            frame_size: (16, 16),
            durations: vec![3, 5],
        }
    }

    #[test]
    fn test_config_defaults_fill_missing_json_fields() {
        let config: AtlasConfig =
            serde_json::from_str(r#"{ "split_quantum": 16, "hand_roles": "red_right" }"#).unwrap();
        assert_eq!(config.split_quantum, 16);
        assert_eq!(config.pack_quantum, 2);
        assert_eq!(config.hand_roles, HandRoles::RedRight);
        assert!(config.collapse_singles);
    }

    #[test]
    fn test_pack_groups_merges_mirrors_and_fills_directions() {
        let mut alias = input("Pose", None);
        alias.group.copy_name = Some("Idle".to_string());

        let packed = pack_groups(
            vec![alias, input("Idle", Some(mirrored_pair()))],
            &AtlasConfig::default(),
        )
        .unwrap();

        assert_eq!(packed.unique_frames.len(), 1);
        assert!(packed.unresolved.is_empty());
        let idle = &packed.groups[1];
        for direction in Direction::ALL {
            let frames: Vec<_> = idle.sequence(direction).iter().copied().collect();
            assert_eq!(frames.len(), 2);
            assert!(!frames[0].flip);
            assert!(frames[1].flip);
            assert_eq!(frames[1].frame_index, 0);
            // Odd width flip gains one pixel of sprite offset.
            assert_eq!(frames[1].sprite_offset.x, frames[0].sprite_offset.x + 1);
            assert_eq!(frames[1].duration, 5);
        }
        assert!(!idle.sequence(Direction::Down).frames[1].changed());

        let pose = &packed.groups[0];
        assert!(pose.is_alias());
        assert_eq!(pose.directions, idle.directions);
    }

    #[test]
    fn test_first_direction_of_a_mirrored_pair_stays_unflipped() {
        // 3x3 frame with a dark top-left pixel in DownRight and its mirror in
        // DownLeft; every other row is empty.
        let mut anim = RgbaImage::new(16, 128);
        for (row, dark_column) in [(1, 6), (7, 8)] {
            for y in 6..9 {
                for x in 6..9 {
                    anim.put_pixel(x, row * 16 + y, BODY);
                }
            }
            anim.put_pixel(dark_column, row * 16 + 6, Rgba([5, 5, 5, 255]));
        }
        let sheets = GroupSheets {
            anim,
            offsets: RgbaImage::new(16, 128),
            shadow: None,
        };
        let mut walk = input("Walk", Some(sheets));
        walk.durations = vec![4];

        let packed = pack_groups(vec![walk], &AtlasConfig::default()).unwrap();
        let group = &packed.groups[0];
        let down_left = group.sequence(Direction::DownLeft).frames[0].value();
        let down_right = group.sequence(Direction::DownRight).frames[0].value();

        assert_eq!(packed.unique_frames.len(), 2);
        assert!(!down_left.flip);
        assert!(down_right.flip);
        assert_eq!(down_left.frame_index, 1);
        assert_eq!(down_right.frame_index, 1);
        assert_eq!(down_right.sprite_offset.x, down_left.sprite_offset.x + 1);
    }

    #[test]
    fn test_zero_quantum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "pack_quantum": 0 }"#).unwrap();
        assert!(matches!(
            AtlasConfig::from_json_file(&path),
            Err(AtlasError::InvalidConfig(_))
        ));

        let config = AtlasConfig {
            split_quantum: 0,
            ..AtlasConfig::default()
        };
        let result = pack_groups(vec![input("Idle", Some(mirrored_pair()))], &config);
        assert!(matches!(result, Err(AtlasError::InvalidConfig(_))));

        let frames = [RgbaImage::from_pixel(2, 2, BODY)];
        let points = [ActionPoints::default()];
        assert!(matches!(
            pack_frames(&frames, &points, 0, HandRoles::RedLeft),
            Err(AtlasError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pack_groups_without_frames_fails() {
        let result = pack_groups(vec![input("Idle", None)], &AtlasConfig::default());
        assert!(matches!(result, Err(AtlasError::NoFramesFound)));
    }

    #[test]
    fn test_encode_png_round_trips_pixels() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, BODY);
        let config = AtlasConfig {
            optimise_png: false,
            ..AtlasConfig::default()
        };
        let data = encode_png(&image, &config).unwrap();
        let decoded = image::load_from_memory(&data).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }
}
