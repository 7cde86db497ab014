//! Atlas image generation and frame deduplication.
//!
//! Handles duplicate and mirror detection, layout calculation and the final
//! atlas and offsets atlas images.

use image::{imageops, Rgba, RgbaImage};
use std::hash::{Hash, Hasher};
use tracing::warn;
use twox_hash::XxHash64;

use crate::graphics::{
    atlas::{check_quantum, AtlasError},
    geometry::{center_bounds, place_in_cell, round_up_to_multiple, Offset, Rectangle},
    markers::{blend_markers, ActionPoints, HandRoles},
};

/// One frame handed to [`deduplicate_frames`]
#[derive(Debug, Clone)]
pub struct FrameSource {
    /// Cropped frame pixels
    pub image: RgbaImage,
    /// Attachment points relative to the centre of `image`
    pub points: ActionPoints,
}

/// Where an input frame ended up after deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRemap {
    pub frame_index: usize,
    pub flip: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    pub unique_images: Vec<RgbaImage>,
    pub unique_points: Vec<ActionPoints>,
    /// `remap[original_index]` locates the unique frame standing in for it
    pub remap: Vec<FrameRemap>,
}

#[derive(Debug, Clone)]
pub struct AtlasLayout {
    pub dimensions: (u32, u32),
    pub frames_per_row: u32,
    pub rows: u32,
    pub frame_size: (u32, u32),
}

impl AtlasLayout {
    /// Top-left pixel of the cell holding frame `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let column = index as u32 % self.frames_per_row;
        let row = index as u32 / self.frames_per_row;
        (column * self.frame_size.0, row * self.frame_size.1)
    }

    pub fn capacity(&self) -> usize {
        (self.frames_per_row * self.rows) as usize
    }
}

/// A packed atlas with its parallel offsets atlas
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub atlas: RgbaImage,
    pub offsets: RgbaImage,
    pub layout: AtlasLayout,
}

/// Finds the smallest set of frames that every input frame is either a copy of or
/// a horizontal mirror of.
///
/// Frames are visited in order and compared with every unique frame found so far
/// of the same size. A frame only merges when its pixels match exactly and, with
/// `check_points`, its attachment points match under the same transform.
pub fn deduplicate_frames(frames: &[FrameSource], check_points: bool) -> Deduplicated {
    let mut result = Deduplicated {
        remap: Vec::with_capacity(frames.len()),
        ..Default::default()
    };
    let mut unique_hashes: Vec<u64> = Vec::new();

    for frame in frames {
        let flipped = imageops::flip_horizontal(&frame.image);
        let odd_width = frame.image.width() % 2 == 1;
        let frame_hash = calculate_frame_hash(&frame.image);
        let flipped_hash = calculate_frame_hash(&flipped);

        let found = result
            .unique_images
            .iter()
            .enumerate()
            .find_map(|(candidate_idx, candidate)| {
                if candidate.dimensions() != frame.image.dimensions() {
                    return None;
                }
                let candidate_points = &result.unique_points[candidate_idx];
                let candidate_hash = unique_hashes[candidate_idx];

                if candidate_hash == frame_hash
                    && frames_are_identical(&frame.image, candidate)
                    && (!check_points || candidate_points.matches(&frame.points, false, odd_width))
                {
                    return Some(FrameRemap {
                        frame_index: candidate_idx,
                        flip: false,
                    });
                }

                if candidate_hash == flipped_hash
                    && frames_are_identical(&flipped, candidate)
                    && (!check_points || candidate_points.matches(&frame.points, true, odd_width))
                {
                    return Some(FrameRemap {
                        frame_index: candidate_idx,
                        flip: true,
                    });
                }

                None
            });

        let remap = found.unwrap_or_else(|| {
            let frame_index = result.unique_images.len();
            result.unique_images.push(frame.image.clone());
            result.unique_points.push(frame.points);
            unique_hashes.push(frame_hash);
            FrameRemap {
                frame_index,
                flip: false,
            }
        });
        result.remap.push(remap);
    }

    result
}

/// Calculate a 64-bit hash of an image frame for fast comparison
fn calculate_frame_hash(frame: &RgbaImage) -> u64 {
    let mut hasher = XxHash64::default();
    frame.as_raw().hash(&mut hasher);
    hasher.finish()
}

/// Check if two frames are pixel-for-pixel identical on every channel
fn frames_are_identical(a: &RgbaImage, b: &RgbaImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
}

/// Cell size fitting every frame and every frame's attachment points when both
/// are centred in the cell.
pub fn calculate_cell_size(
    images: &[RgbaImage],
    points: &[ActionPoints],
    quantum: u32,
) -> (u32, u32) {
    let mut width = 0;
    let mut height = 0;

    for image in images {
        width = width.max(image.width());
        height = height.max(image.height());
    }
    for frame_points in points {
        let marker_bounds = center_bounds(&frame_points.rect());
        width = width.max(marker_bounds.width as u32);
        height = height.max(marker_bounds.height as u32);
    }

    (
        round_up_to_multiple(width, quantum),
        round_up_to_multiple(height, quantum),
    )
}

/// Creates a square atlas grid able to hold `total_unique_frames` cells.
pub fn create_atlas_layout(
    total_unique_frames: usize,
    frame_width: u32,
    frame_height: u32,
) -> AtlasLayout {
    let side = ((total_unique_frames as f64).sqrt().ceil() as u32).max(1);

    AtlasLayout {
        dimensions: (side * frame_width, side * frame_height),
        frames_per_row: side,
        rows: side,
        frame_size: (frame_width, frame_height),
    }
}

/// Generates the atlas image, centring each unique frame in its cell.
pub fn generate_atlas(
    unique_frames: &[RgbaImage],
    layout: &AtlasLayout,
) -> Result<RgbaImage, AtlasError> {
    if unique_frames.is_empty() {
        return Err(AtlasError::NoFramesFound);
    }
    let (atlas_width, atlas_height) = layout.dimensions;
    let (frame_width, frame_height) = layout.frame_size;

    let mut atlas = RgbaImage::new(atlas_width, atlas_height);

    for (i, frame) in unique_frames.iter().enumerate() {
        let (x, y) = layout.cell_origin(i);
        let frame_rect = Rectangle::new(0, 0, frame.width() as i32, frame.height() as i32);
        let diff = place_in_cell(frame_width, frame_height, &frame_rect, false, Offset::ZERO);

        overlay_image(
            &mut atlas,
            frame,
            x as i64 + diff.x as i64,
            y as i64 + diff.y as i64,
        );
    }

    Ok(atlas)
}

/// Renders attachment points back into marker pixels, one cell per unique frame.
///
/// Points are relative to the cell centre. Markers that land on the same pixel
/// are blended so that every one of them can still be decoded.
pub fn generate_offsets_atlas(
    unique_points: &[ActionPoints],
    layout: &AtlasLayout,
    roles: HandRoles,
) -> RgbaImage {
    let (atlas_width, atlas_height) = layout.dimensions;
    let (frame_width, frame_height) = layout.frame_size;
    let mut offsets = RgbaImage::new(atlas_width, atlas_height);

    for (i, points) in unique_points.iter().enumerate() {
        let (x, y) = layout.cell_origin(i);
        let cell_centre = Offset::new(
            (x + frame_width / 2) as i32,
            (y + frame_height / 2) as i32,
        );

        if points.head_hidden() {
            warn!(
                "Head marker of sheet frame {} overlaps a hand marker and will read back as the centre",
                i
            );
        }

        for (point, colour) in points.markers(roles) {
            let target = cell_centre + point;
            paint_marker(&mut offsets, target, colour);
        }
    }

    offsets
}

fn paint_marker(image: &mut RgbaImage, at: Offset, colour: Rgba<u8>) {
    if at.x < 0 || at.y < 0 || at.x as u32 >= image.width() || at.y as u32 >= image.height() {
        return;
    }
    let pixel = image.get_pixel_mut(at.x as u32, at.y as u32);
    *pixel = if pixel[3] == 0 {
        colour
    } else {
        blend_markers(*pixel, colour)
    };
}

/// Packs unique frames and their attachment points into an atlas pair.
pub fn pack_frames(
    unique_images: &[RgbaImage],
    unique_points: &[ActionPoints],
    quantum: u32,
    roles: HandRoles,
) -> Result<PackedAtlas, AtlasError> {
    check_quantum("pack_quantum", quantum)?;
    let (frame_width, frame_height) = calculate_cell_size(unique_images, unique_points, quantum);
    let layout = create_atlas_layout(unique_images.len(), frame_width, frame_height);
    let atlas = generate_atlas(unique_images, &layout)?;
    let offsets = generate_offsets_atlas(unique_points, &layout, roles);

    Ok(PackedAtlas {
        atlas,
        offsets,
        layout,
    })
}

/// Copies every non-transparent pixel of `image` onto `canvas` at (`x`, `y`).
/// Pixels falling outside the canvas are dropped.
pub fn overlay_image(canvas: &mut RgbaImage, image: &RgbaImage, x: i64, y: i64) {
    let (canvas_width, canvas_height) = (canvas.width() as i64, canvas.height() as i64);
    for (px, py, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let (tx, ty) = (x + px as i64, y + py as i64);
        if tx >= 0 && ty >= 0 && tx < canvas_width && ty < canvas_height {
            canvas.put_pixel(tx as u32, ty as u32, *pixel);
        }
    }
}
