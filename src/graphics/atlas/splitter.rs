//! Splits a packed atlas back into one sheet per animation group.
//!
//! Each output sheet has one row per direction (clockwise from Down) and one
//! column per frame. Frames are re-rendered from the atlas using their stored
//! flip flag and sprite offset, and the shadow anchor is drawn from a shared
//! marker image.

use std::borrow::Cow;

use image::{imageops, RgbaImage};
use tracing::debug;

use crate::data::{AnimFrame, AnimGroup, Direction, DIRECTION_COUNT};
use crate::graphics::{
    atlas::{
        analyser::{cell_at, crop, extract_frame, find_content_bounds, grid_size},
        generator::overlay_image,
        check_quantum, AtlasConfig, AtlasError,
    },
    geometry::{place_in_cell, round_up_to_multiple, Offset, Rectangle, TLRectangle},
    markers::WHITE,
};

/// One cell of the source atlas, cropped to its content
#[derive(Debug, Clone)]
pub struct AtlasCell {
    /// Bounds of the frame pixels inside the cell
    pub bounds: TLRectangle,
    pub image: RgbaImage,
    /// Bounds of the marker pixels relative to the cell centre
    pub marker_bounds: Option<TLRectangle>,
    pub markers: Option<RgbaImage>,
}

/// A single animation's sheets
#[derive(Debug, Clone)]
pub struct SplitSheet {
    pub name: String,
    pub anim: RgbaImage,
    pub offsets: RgbaImage,
    pub shadow: RgbaImage,
    /// Size of one frame cell in all three sheets
    pub frame_size: (u32, u32),
    /// Only the Down row was written
    pub collapsed: bool,
}

/// The marker drawn for shadows when no other image is given: one white pixel.
pub fn default_shadow_marker() -> RgbaImage {
    RgbaImage::from_pixel(1, 1, WHITE)
}

/// Crops every cell of the atlas and, when present, the matching offsets cell.
pub fn analyse_atlas(
    atlas: &RgbaImage,
    offsets: Option<&RgbaImage>,
    frame_width: u32,
    frame_height: u32,
) -> Result<Vec<AtlasCell>, AtlasError> {
    if let Some(offsets) = offsets {
        if offsets.dimensions() != atlas.dimensions() {
            return Err(AtlasError::malformed(
                "atlas",
                "dimensions of Anim and Offsets images do not match",
            ));
        }
    }

    let (columns, rows) = grid_size("atlas", atlas, frame_width, frame_height)?;
    let to_centre = Offset::new(-(frame_width as i32 / 2), -(frame_height as i32 / 2));
    let mut cells = Vec::with_capacity((columns * rows) as usize);

    for row in 0..rows {
        for column in 0..columns {
            let extracted = extract_frame(&cell_at(atlas, column, row, frame_width, frame_height));

            let (marker_bounds, markers) = match offsets {
                Some(offsets) => {
                    let offsets_cell = cell_at(offsets, column, row, frame_width, frame_height);
                    match find_content_bounds(&offsets_cell) {
                        Some(bounds) => (
                            Some(bounds.translate(to_centre)),
                            Some(crop(&offsets_cell, &bounds)),
                        ),
                        None => (None, None),
                    }
                }
                None => (None, None),
            };

            cells.push(AtlasCell {
                bounds: extracted.bounds,
                image: extracted.image,
                marker_bounds,
                markers,
            });
        }
    }

    Ok(cells)
}

fn atlas_cell<'a>(
    cells: &'a [AtlasCell],
    group: &AnimGroup,
    frame: &AnimFrame,
) -> Result<&'a AtlasCell, AtlasError> {
    cells
        .get(frame.frame_index)
        .ok_or_else(|| AtlasError::FrameOutOfRange {
            group: group.name.clone(),
            frame_index: frame.frame_index,
            available: cells.len(),
        })
}

/// Cell size fitting every frame of `group` once centred and shifted by its
/// sprite offset.
pub fn calculate_group_cell_size(
    group: &AnimGroup,
    cells: &[AtlasCell],
    quantum: u32,
) -> Result<(u32, u32), AtlasError> {
    check_quantum("split_quantum", quantum)?;
    let mut max_width = 0;
    let mut max_height = 0;

    for direction in Direction::ALL {
        for frame in group.sequence(direction).iter() {
            let bounds = atlas_cell(cells, group, frame)?.bounds;
            // Offsets count twice so the frame stays centrable.
            let width = bounds.width + frame.sprite_offset.x.abs() * 2;
            let height = bounds.height + frame.sprite_offset.y.abs() * 2;
            max_width = max_width.max(width as u32);
            max_height = max_height.max(height as u32);
        }
    }

    Ok((
        round_up_to_multiple(max_width, quantum),
        round_up_to_multiple(max_height, quantum),
    ))
}

/// Renders one group into its own anim, offsets and shadow sheets.
pub fn split_group(
    group: &AnimGroup,
    cells: &[AtlasCell],
    atlas_frame_size: (u32, u32),
    shadow_marker: &RgbaImage,
    config: &AtlasConfig,
) -> Result<SplitSheet, AtlasError> {
    let (cell_width, cell_height) =
        calculate_group_cell_size(group, cells, config.split_quantum)?;
    let collapsed = config.collapse_singles && group.is_collapsible();
    let rows = if collapsed { 1 } else { DIRECTION_COUNT as u32 };
    let columns = group.max_frame_count().max(1) as u32;

    let canvas = (cell_width * columns, cell_height * rows);
    let mut anim = RgbaImage::new(canvas.0, canvas.1);
    let mut offsets = RgbaImage::new(canvas.0, canvas.1);
    let mut shadow = RgbaImage::new(canvas.0, canvas.1);

    let half_cell = Offset::new(cell_width as i32 / 2, cell_height as i32 / 2);
    let half_marker = Offset::new(
        shadow_marker.width() as i32 / 2,
        shadow_marker.height() as i32 / 2,
    );

    for row in 0..rows {
        let Some(direction) = Direction::from_sheet_row(row as usize) else {
            continue;
        };
        let start_y = (row * cell_height) as i64;

        for (column, frame) in group.sequence(direction).iter().enumerate() {
            let cell = atlas_cell(cells, group, frame)?;
            let start_x = (column as u32 * cell_width) as i64;
            let bounds: Rectangle = cell.bounds.to_bottom_left(atlas_frame_size.1 as i32);

            let (image, markers, bounds, marker_bounds) = if frame.flip {
                (
                    Cow::Owned(imageops::flip_horizontal(&cell.image)),
                    cell.markers.as_ref().map(|m| Cow::Owned(imageops::flip_horizontal(m))),
                    bounds.flipped_within(atlas_frame_size.0 as i32),
                    cell.marker_bounds.map(|b| b.flipped()),
                )
            } else {
                (
                    Cow::Borrowed(&cell.image),
                    cell.markers.as_ref().map(Cow::Borrowed),
                    bounds,
                    cell.marker_bounds,
                )
            };

            let position = place_in_cell(
                cell_width,
                cell_height,
                &bounds,
                frame.flip,
                frame.sprite_offset,
            );
            overlay_image(
                &mut anim,
                &image,
                start_x + position.x as i64,
                start_y + position.y as i64,
            );

            if let (Some(markers), Some(marker_bounds)) = (markers, marker_bounds) {
                let at = half_cell + frame.sprite_offset + Offset::new(marker_bounds.x, marker_bounds.y);
                overlay_image(
                    &mut offsets,
                    &markers,
                    start_x + at.x as i64,
                    start_y + at.y as i64,
                );
            }

            let at = half_cell - half_marker + frame.shadow_offset;
            overlay_image(
                &mut shadow,
                shadow_marker,
                start_x + at.x as i64,
                start_y + at.y as i64,
            );
        }
    }

    debug!(
        "Split {}: {}x{} cells, {} columns, {} rows{}",
        group.name,
        cell_width,
        cell_height,
        columns,
        rows,
        if collapsed { " (collapsed)" } else { "" }
    );

    Ok(SplitSheet {
        name: group.name.clone(),
        anim,
        offsets,
        shadow,
        frame_size: (cell_width, cell_height),
        collapsed,
    })
}

/// Splits an atlas into per-group sheets. Alias groups own no sheets and are
/// skipped.
pub fn split_atlas(
    atlas: &RgbaImage,
    offsets: Option<&RgbaImage>,
    shadow_marker: &RgbaImage,
    frame_size: (u32, u32),
    groups: &[AnimGroup],
    config: &AtlasConfig,
) -> Result<Vec<SplitSheet>, AtlasError> {
    config.validate()?;
    let cells = analyse_atlas(atlas, offsets, frame_size.0, frame_size.1)?;

    groups
        .iter()
        .filter(|group| !group.is_alias())
        .map(|group| split_group(group, &cells, frame_size, shadow_marker, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AnimationSequence;
    use crate::graphics::markers::{BLUE, GREEN, RED};
    use image::Rgba;

    const PIXEL: Rgba<u8> = Rgba([100, 50, 25, 255]);

    /// 16x16 atlas with one 3x2 block (left column marked) centred in cell 0.
    fn atlas() -> (RgbaImage, RgbaImage) {
        let mut atlas = RgbaImage::new(16, 16);
        for y in 7..9 {
            for x in 7..10 {
                atlas.put_pixel(x, y, PIXEL);
            }
        }
        atlas.put_pixel(7, 7, Rgba([1, 1, 1, 255]));
        let mut offsets = RgbaImage::new(16, 16);
        offsets.put_pixel(7, 8, RED);
        offsets.put_pixel(8, 8, GREEN);
        offsets.put_pixel(9, 8, BLUE);
        (atlas, offsets)
    }

    fn group(frames: &[AnimFrame]) -> AnimGroup {
        let mut group = AnimGroup::new("Idle", Some(7));
        for sequence in &mut group.directions {
            *sequence = AnimationSequence::from_frames(frames.iter().copied());
        }
        group
    }

    #[test]
    fn test_analyse_atlas_records_marker_bounds() {
        let (atlas, offsets) = atlas();
        let cells = analyse_atlas(&atlas, Some(&offsets), 16, 16).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].bounds, TLRectangle::new(7, 7, 3, 2));
        assert_eq!(cells[0].marker_bounds, Some(TLRectangle::new(-1, 0, 3, 1)));
    }

    #[test]
    fn test_group_cell_size_counts_offsets_twice() {
        let (atlas, _) = atlas();
        let cells = analyse_atlas(&atlas, None, 16, 16).unwrap();
        let frame = AnimFrame {
            sprite_offset: Offset::new(3, -1),
            duration: 2,
            ..Default::default()
        };
        let size = calculate_group_cell_size(&group(&[frame]), &cells, 8).unwrap();
        // 3 + 6 = 9 -> 16, 2 + 2 = 4 -> 8
        assert_eq!(size, (16, 8));
    }

    #[test]
    fn test_collapsible_group_emits_one_row() {
        let (atlas, offsets) = atlas();
        let frame = AnimFrame {
            duration: 2,
            ..Default::default()
        };
        let sheets = split_atlas(
            &atlas,
            Some(&offsets),
            &default_shadow_marker(),
            (16, 16),
            &[group(&[frame, frame])],
            &AtlasConfig::default(),
        )
        .unwrap();
        assert_eq!(sheets.len(), 1);
        assert!(sheets[0].collapsed);
        assert_eq!(sheets[0].frame_size, (8, 8));
        assert_eq!(sheets[0].anim.dimensions(), (16, 8));

        let config = AtlasConfig {
            collapse_singles: false,
            ..AtlasConfig::default()
        };
        let sheets = split_atlas(
            &atlas,
            Some(&offsets),
            &default_shadow_marker(),
            (16, 16),
            &[group(&[frame])],
            &config,
        )
        .unwrap();
        assert_eq!(sheets[0].anim.dimensions(), (8, 64));
    }

    #[test]
    fn test_flipped_frame_is_mirrored_in_place() {
        let (atlas, offsets) = atlas();
        let frame = AnimFrame {
            flip: true,
            duration: 2,
            ..Default::default()
        };
        let sheets = split_atlas(
            &atlas,
            Some(&offsets),
            &default_shadow_marker(),
            (16, 16),
            &[group(&[frame])],
            &AtlasConfig::default(),
        )
        .unwrap();
        let sheet = &sheets[0];
        // Odd width, flipped: 8/2 - ceil(3/2) = 2, so columns 2..5 with the
        // marked column now on the right.
        assert_eq!(sheet.anim.get_pixel(4, 3), &Rgba([1, 1, 1, 255]));
        assert_eq!(sheet.anim.get_pixel(2, 3), &PIXEL);
        assert_eq!(sheet.anim.get_pixel(1, 3)[3], 0);
        // Markers mirrored around the centre: blue now on the left.
        assert_eq!(sheet.offsets.get_pixel(2, 4), &BLUE);
        assert_eq!(sheet.offsets.get_pixel(4, 4), &RED);
        // Shadow marker at the cell centre.
        assert_eq!(sheet.shadow.get_pixel(4, 4), &WHITE);
    }

    #[test]
    fn test_aliases_are_skipped_and_bad_indices_fail() {
        let (atlas, _) = atlas();
        let alias = AnimGroup::alias("Pose", None, "Idle");
        let bad = group(&[AnimFrame {
            frame_index: 4,
            ..Default::default()
        }]);
        let config = AtlasConfig::default();
        let marker = default_shadow_marker();

        let sheets = split_atlas(&atlas, None, &marker, (16, 16), &[alias], &config).unwrap();
        assert!(sheets.is_empty());
        assert!(matches!(
            split_atlas(&atlas, None, &marker, (16, 16), &[bad], &config),
            Err(AtlasError::FrameOutOfRange { frame_index: 4, .. })
        ));
    }
}
