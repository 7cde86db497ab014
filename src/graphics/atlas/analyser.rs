//! Frame Analysis for Atlas Generation
//!
//! Cuts animation sheets into cells and measures each one: the tight bounding
//! box of its visible pixels, its attachment points and its shadow anchor.
//! Sprite offsets are expressed relative to a crop that is centred in its cell.

use image::{imageops, RgbaImage};
use tracing::debug;

use crate::data::{AnimFrame, Direction, DIRECTION_COUNT};
use crate::graphics::{
    atlas::{AtlasConfig, AtlasError, GroupSheets},
    geometry::{floor_div, Offset, TLRectangle},
    markers::{decode_markers, ActionPoints, RowOrder, WHITE},
};

/// The visible part of one cell
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    /// Bounds of the visible pixels inside the cell
    pub bounds: TLRectangle,
    /// Pixels inside `bounds`
    pub image: RgbaImage,
}

/// Holds data extracted and calculated for a single frame of an animation sheet.
#[derive(Debug, Clone)]
pub struct AnalysedFrame {
    pub image: RgbaImage,
    /// Attachment points relative to the centre of the cropped image
    pub points: ActionPoints,
    pub bounds: TLRectangle,
    pub direction: Direction,
    /// Position inside the direction sequence
    pub position: usize,
    /// Timeline entry with offsets and duration filled in; `frame_index` and
    /// `flip` are assigned once the atlas is packed.
    pub frame: AnimFrame,
}

/// Holds the results of analysing one animation sheet.
#[derive(Debug)]
pub struct SheetAnalysis {
    pub name: String,
    pub frames: Vec<AnalysedFrame>,
    pub rows: u32,
    pub columns: u32,
}

impl SheetAnalysis {
    /// A single row stands for all eight directions.
    pub fn is_collapsed(&self) -> bool {
        self.rows == 1
    }
}

/// Finds the bounding box of non-transparent pixels in an image
pub fn find_content_bounds(image: &RgbaImage) -> Option<TLRectangle> {
    let (width, height) = image.dimensions();
    let mut min_x = width as i32;
    let mut min_y = height as i32;
    let mut max_x = -1;
    let mut max_y = -1;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > 0 {
            min_x = min_x.min(x as i32);
            min_y = min_y.min(y as i32);
            max_x = max_x.max(x as i32);
            max_y = max_y.max(y as i32);
        }
    }

    if max_x < min_x || max_y < min_y {
        None
    } else {
        Some(TLRectangle::from_bounds((min_x, min_y, max_x + 1, max_y + 1)))
    }
}

/// Crops a cell down to its visible pixels.
///
/// An empty cell (a character can vanish for a frame) yields a transparent 1x1
/// box at the cell centre, so later stages never see a zero-sized frame.
pub fn extract_frame(cell: &RgbaImage) -> ExtractedFrame {
    let bounds = find_content_bounds(cell).unwrap_or_else(|| {
        TLRectangle::new(cell.width() as i32 / 2, cell.height() as i32 / 2, 1, 1)
    });
    ExtractedFrame {
        image: crop(cell, &bounds),
        bounds,
    }
}

/// Position of the first opaque white pixel in row-major order.
pub fn extract_shadow(cell: &RgbaImage) -> Option<Offset> {
    cell.enumerate_pixels()
        .find(|(_, _, pixel)| **pixel == WHITE)
        .map(|(x, y, _)| Offset::new(x as i32, y as i32))
}

/// Crops `bounds` out of `image`. Parts of `bounds` outside the image come out
/// transparent.
pub fn crop(image: &RgbaImage, bounds: &TLRectangle) -> RgbaImage {
    let mut out = RgbaImage::new(bounds.width.max(0) as u32, bounds.height.max(0) as u32);
    imageops::replace(&mut out, image, -(bounds.x as i64), -(bounds.y as i64));
    out
}

/// Copies the cell at grid position (`column`, `row`).
pub fn cell_at(sheet: &RgbaImage, column: u32, row: u32, width: u32, height: u32) -> RgbaImage {
    imageops::crop_imm(sheet, column * width, row * height, width, height).to_image()
}

/// Number of (columns, rows) of `width` x `height` cells in `sheet`.
pub fn grid_size(
    name: &str,
    sheet: &RgbaImage,
    width: u32,
    height: u32,
) -> Result<(u32, u32), AtlasError> {
    if width == 0 || height == 0 {
        return Err(AtlasError::malformed(name, "could not find frame dimensions"));
    }
    if sheet.width() % width != 0 || sheet.height() % height != 0 {
        return Err(AtlasError::malformed(
            name,
            format!(
                "sheet of {}x{} is not divisible by frame dimensions {}x{}",
                sheet.width(),
                sheet.height(),
                width,
                height
            ),
        ));
    }
    Ok((sheet.width() / width, sheet.height() / height))
}

/// Analyses every cell of one per-animation sheet.
///
/// Rows are direction sequences listed clockwise from Down (or a single row
/// standing for all directions), columns are frames sharing `durations`.
/// Frames are returned grouped by direction in storage order.
pub fn analyse_group_sheet(
    name: &str,
    sheets: &GroupSheets,
    frame_width: u32,
    frame_height: u32,
    durations: &[u32],
    config: &AtlasConfig,
) -> Result<SheetAnalysis, AtlasError> {
    let anim = &sheets.anim;
    let same_size = |other: &RgbaImage| other.dimensions() == anim.dimensions();
    if !same_size(&sheets.offsets) || !sheets.shadow.as_ref().map_or(true, same_size) {
        return Err(AtlasError::malformed(
            name,
            "dimensions of Anim, Shadow and Offsets sheets do not match",
        ));
    }

    let (columns, rows) = grid_size(name, anim, frame_width, frame_height)?;

    if durations.len() != columns as usize {
        return Err(AtlasError::malformed(
            name,
            format!(
                "{} frame durations given for {} frames",
                durations.len(),
                columns
            ),
        ));
    }
    if let Some(bad) = durations.iter().find(|&&duration| duration == 0) {
        return Err(AtlasError::malformed(
            name,
            format!("invalid duration value {}", bad),
        ));
    }
    if rows != 1 && rows != DIRECTION_COUNT as u32 {
        return Err(AtlasError::malformed(
            name,
            format!("sequence count is {}, expected 1 or 8", rows),
        ));
    }

    let half_cell = Offset::new(frame_width as i32 / 2, frame_height as i32 / 2);
    let mut frames = Vec::with_capacity((columns * rows) as usize);

    // Directions are visited in storage order so that the first of a mirrored
    // pair, e.g. DownLeft before DownRight, becomes the unflipped atlas frame.
    for direction in Direction::ALL.into_iter().take(rows as usize) {
        let row = direction.sheet_row() as u32;

        for column in 0..columns {
            let cell = cell_at(anim, column, row, frame_width, frame_height);
            let extracted = extract_frame(&cell);
            let bounds = extracted.bounds;
            let centre = bounds.center();

            let offsets_cell = cell_at(&sheets.offsets, column, row, frame_width, frame_height);
            let points = decode_markers(&offsets_cell, RowOrder::TopDown, config.hand_roles)
                .map_err(|source| AtlasError::MarkerDecode {
                    group: name.to_string(),
                    direction,
                    frame: column as usize,
                    source,
                })?
                .unwrap_or_else(|| ActionPoints::uniform(centre))
                .translated(-centre);

            let sprite_offset = Offset::new(
                bounds.x - (half_cell.x - bounds.width / 2),
                bounds.y - (half_cell.y - bounds.height / 2),
            );

            let shadow_offset = match &sheets.shadow {
                Some(shadow) => {
                    let shadow_cell = cell_at(shadow, column, row, frame_width, frame_height);
                    extract_shadow(&shadow_cell)
                        .map(|anchor| anchor - half_cell)
                        .unwrap_or_default()
                }
                None => Offset::new(0, floor_div(-(bounds.y - half_cell.y), 2)),
            };

            frames.push(AnalysedFrame {
                image: extracted.image,
                points,
                bounds,
                direction,
                position: column as usize,
                frame: AnimFrame {
                    idx: column as usize,
                    frame_index: 0,
                    flip: false,
                    duration: durations[column as usize],
                    shadow_offset,
                    sprite_offset,
                },
            });
        }
    }

    debug!(
        "Analysed {}: {} frames in {}x{} cells ({} rows)",
        name,
        frames.len(),
        frame_width,
        frame_height,
        rows
    );

    Ok(SheetAnalysis {
        name: name.to_string(),
        frames,
        rows,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::markers::{BLUE, GREEN, RED};
    use image::Rgba;

    const OPAQUE: Rgba<u8> = Rgba([10, 20, 30, 255]);

    fn fill(image: &mut RgbaImage, rect: TLRectangle, colour: Rgba<u8>) {
        for y in rect.top()..rect.bottom() {
            for x in rect.left()..rect.right() {
                image.put_pixel(x as u32, y as u32, colour);
            }
        }
    }

    #[test]
    fn test_empty_cell_falls_back_to_centre_pixel() {
        let cell = RgbaImage::new(10, 10);
        let extracted = extract_frame(&cell);
        assert_eq!(extracted.bounds, TLRectangle::new(5, 5, 1, 1));
        assert_eq!(extracted.image.dimensions(), (1, 1));
    }

    #[test]
    fn test_tight_bounds() {
        let mut cell = RgbaImage::new(16, 16);
        fill(&mut cell, TLRectangle::new(3, 4, 5, 2), OPAQUE);
        cell.put_pixel(9, 12, Rgba([0, 0, 0, 1]));
        let extracted = extract_frame(&cell);
        assert_eq!(extracted.bounds, TLRectangle::new(3, 4, 7, 9));
        assert_eq!(extracted.image.get_pixel(0, 0), &OPAQUE);
    }

    #[test]
    fn test_shadow_is_first_white_pixel() {
        let mut cell = RgbaImage::new(8, 8);
        assert_eq!(extract_shadow(&cell), None);
        cell.put_pixel(5, 2, Rgba([255, 255, 255, 128]));
        cell.put_pixel(6, 3, WHITE);
        cell.put_pixel(1, 4, WHITE);
        assert_eq!(extract_shadow(&cell), Some(Offset::new(6, 3)));
    }

    #[test]
    fn test_grid_size_rejects_uneven_sheets() {
        let sheet = RgbaImage::new(30, 16);
        assert!(grid_size("Walk", &sheet, 8, 8).is_err());
        assert!(grid_size("Walk", &sheet, 0, 8).is_err());
        assert_eq!(grid_size("Walk", &sheet, 10, 8).unwrap(), (3, 2));
    }

    fn single_row_sheets() -> GroupSheets {
        let mut anim = RgbaImage::new(32, 16);
        // Frame 0: 4x4 block with its top-left at (6, 5).
        fill(&mut anim, TLRectangle::new(6, 5, 4, 4), OPAQUE);
        // Frame 1 stays empty.
        let mut offsets = RgbaImage::new(32, 16);
        offsets.put_pixel(6, 6, RED);
        offsets.put_pixel(8, 7, GREEN);
        offsets.put_pixel(9, 6, BLUE);
        let mut shadow = RgbaImage::new(32, 16);
        shadow.put_pixel(8, 12, WHITE);
        GroupSheets {
            anim,
            offsets,
            shadow: Some(shadow),
        }
    }

    #[test]
    fn test_analyse_group_sheet() {
        let sheets = single_row_sheets();
        let analysis =
            analyse_group_sheet("Walk", &sheets, 16, 16, &[4, 6], &AtlasConfig::default()).unwrap();
        assert!(analysis.is_collapsed());
        assert_eq!(analysis.frames.len(), 2);

        let first = &analysis.frames[0];
        assert_eq!(first.bounds, TLRectangle::new(6, 5, 4, 4));
        // Centred crop would start at (8 - 2, 8 - 2).
        assert_eq!(first.frame.sprite_offset, Offset::new(0, -1));
        assert_eq!(first.frame.shadow_offset, Offset::new(0, 4));
        assert_eq!(first.frame.duration, 4);
        // Crop centre is (8, 7).
        assert_eq!(first.points.center, Offset::new(0, 0));
        assert_eq!(first.points.left_hand, Offset::new(-2, -1));
        assert_eq!(first.points.head, first.points.center);

        let empty = &analysis.frames[1];
        assert_eq!(empty.bounds, TLRectangle::new(8, 8, 1, 1));
        assert_eq!(empty.points, ActionPoints::default());
        assert_eq!(empty.frame.sprite_offset, Offset::new(0, 0));
        assert_eq!(empty.frame.shadow_offset, Offset::new(0, 0));
    }

    #[test]
    fn test_analyse_rejects_bad_input() {
        let config = AtlasConfig::default();
        let sheets = single_row_sheets();
        assert!(analyse_group_sheet("Walk", &sheets, 16, 16, &[4], &config).is_err());
        assert!(analyse_group_sheet("Walk", &sheets, 16, 16, &[4, 0], &config).is_err());

        let mut mismatched = single_row_sheets();
        mismatched.offsets = RgbaImage::new(16, 16);
        assert!(analyse_group_sheet("Walk", &mismatched, 16, 16, &[4, 6], &config).is_err());

        let three_rows = GroupSheets {
            anim: RgbaImage::new(16, 48),
            offsets: RgbaImage::new(16, 48),
            shadow: None,
        };
        assert!(analyse_group_sheet("Walk", &three_rows, 16, 16, &[4], &config).is_err());
    }

    #[test]
    fn test_partial_markers_identify_frame() {
        let mut sheets = single_row_sheets();
        sheets.offsets.put_pixel(20, 4, GREEN);
        let err = analyse_group_sheet("Walk", &sheets, 16, 16, &[4, 6], &AtlasConfig::default())
            .unwrap_err();
        match err {
            AtlasError::MarkerDecode { group, frame, .. } => {
                assert_eq!(group, "Walk");
                assert_eq!(frame, 1);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
