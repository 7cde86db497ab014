//! Attachment point markers
//!
//! Offsets images encode the body attachment points of a frame as single pixels
//! of reserved colours. This module decodes them into [`ActionPoints`] and
//! provides the colours used when rendering them back.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{Offset, TLRectangle};

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Which primary colour marks which hand.
///
/// Sheets drawn facing left and sheets drawn facing right disagree on this, so it
/// is never assumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandRoles {
    /// Red is the left hand, blue the right hand
    #[default]
    RedLeft,
    /// Red is the right hand, blue the left hand
    RedRight,
}

impl HandRoles {
    fn colours(self) -> (Rgba<u8>, Rgba<u8>) {
        match self {
            HandRoles::RedLeft => (RED, BLUE),
            HandRoles::RedRight => (BLUE, RED),
        }
    }
}

/// Vertical convention of the coordinates reported by [`scan_markers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Raster order, row 0 at the top
    #[default]
    TopDown,
    /// Row 0 at the bottom, as the preview renderer expects
    BottomUp,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("offsets image is corrupt: found {found} but red, green and blue markers are all required")]
    Incomplete { found: String },
}

/// Body attachment points of a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionPoints {
    pub left_hand: Offset,
    pub center: Offset,
    pub right_hand: Offset,
    pub head: Offset,
}

impl ActionPoints {
    pub fn new(left_hand: Offset, center: Offset, right_hand: Offset, head: Offset) -> Self {
        Self {
            left_hand,
            center,
            right_hand,
            head,
        }
    }

    /// All four points on the same spot
    pub fn uniform(point: Offset) -> Self {
        Self::new(point, point, point, point)
    }

    pub fn points(&self) -> [Offset; 4] {
        [self.left_hand, self.center, self.right_hand, self.head]
    }

    pub fn translate(&mut self, offset: Offset) {
        self.left_hand = self.left_hand + offset;
        self.center = self.center + offset;
        self.right_hand = self.right_hand + offset;
        self.head = self.head + offset;
    }

    pub fn translated(mut self, offset: Offset) -> Self {
        self.translate(offset);
        self
    }

    /// The black head marker shares a pixel with a hand marker. Blending turns
    /// that pixel into the hand's colour, so the head decodes as the centre.
    pub fn head_hidden(&self) -> bool {
        self.head != self.center && (self.head == self.left_hand || self.head == self.right_hand)
    }

    pub fn mirrored(&self) -> Self {
        Self::new(
            self.left_hand.mirrored(),
            self.center.mirrored(),
            self.right_hand.mirrored(),
            self.head.mirrored(),
        )
    }

    /// Compares against `other`, optionally as its horizontal mirror.
    ///
    /// Points are relative to the centre of the cropped frame. When the cropped
    /// width is odd the centre column maps onto itself, so the mirrored points
    /// shift one pixel to the right compared to the even case.
    pub fn matches(&self, other: &ActionPoints, flip: bool, odd_width: bool) -> bool {
        if !flip {
            return self == other;
        }
        let parity = Offset::new(i32::from(odd_width), 0);
        self.points()
            .iter()
            .zip(other.points().iter())
            .all(|(mine, theirs)| *mine == theirs.mirrored() + parity)
    }

    /// Top-left bounding box of the four points, one pixel wider and taller so the
    /// far markers are inside it.
    pub fn rect(&self) -> TLRectangle {
        let points = self.points();
        let left = points.iter().map(|p| p.x).min().unwrap_or(0);
        let top = points.iter().map(|p| p.y).min().unwrap_or(0);
        let right = points.iter().map(|p| p.x).max().unwrap_or(0) + 1;
        let bottom = points.iter().map(|p| p.y).max().unwrap_or(0) + 1;
        TLRectangle::from_bounds((left, top, right, bottom))
    }

    /// Markers to paint for these points, in painting order.
    pub fn markers(&self, roles: HandRoles) -> [(Offset, Rgba<u8>); 4] {
        let (left_colour, right_colour) = roles.colours();
        [
            (self.left_hand, left_colour),
            (self.center, GREEN),
            (self.head, BLACK),
            (self.right_hand, right_colour),
        ]
    }
}

/// Raw result of scanning an offsets image, one slot per marker colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub red: Option<Offset>,
    pub green: Option<Offset>,
    pub blue: Option<Offset>,
    pub black: Option<Offset>,
}

impl MarkerScan {
    pub fn is_empty(&self) -> bool {
        self.red.is_none() && self.green.is_none() && self.blue.is_none() && self.black.is_none()
    }

    /// Resolves the scan into attachment points.
    ///
    /// Returns `Ok(None)` when no marker at all was found. The head falls back to
    /// the centre when no black marker exists.
    pub fn into_action_points(self, roles: HandRoles) -> Result<Option<ActionPoints>, MarkerError> {
        match (self.red, self.green, self.blue) {
            (Some(red), Some(center), Some(blue)) => {
                let (left_hand, right_hand) = match roles {
                    HandRoles::RedLeft => (red, blue),
                    HandRoles::RedRight => (blue, red),
                };
                let head = self.black.unwrap_or(center);
                Ok(Some(ActionPoints::new(left_hand, center, right_hand, head)))
            }
            _ if self.is_empty() => Ok(None),
            _ => Err(MarkerError::Incomplete {
                found: self.describe(),
            }),
        }
    }

    fn describe(&self) -> String {
        let found: Vec<&str> = [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("black", self.black),
        ]
        .iter()
        .filter(|(_, point)| point.is_some())
        .map(|(name, _)| *name)
        .collect();
        found.join(", ")
    }
}

/// Scans an offsets image for marker pixels.
///
/// Every pixel with non-zero alpha is tested against each channel rule on its
/// own, so a blended pixel (e.g. yellow) registers for several markers. Pixels
/// are visited row by row in storage order and later hits replace earlier ones.
pub fn scan_markers(image: &RgbaImage, order: RowOrder) -> MarkerScan {
    let mut scan = MarkerScan::default();
    let height = image.height() as i32;

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        let y = match order {
            RowOrder::TopDown => y as i32,
            RowOrder::BottomUp => height - 1 - y as i32,
        };
        let point = Offset::new(x as i32, y);

        if r == 0 && g == 0 && b == 0 {
            scan.black = Some(point);
        }
        if r == 255 {
            scan.red = Some(point);
        }
        if g == 255 {
            scan.green = Some(point);
        }
        if b == 255 {
            scan.blue = Some(point);
        }
    }

    scan
}

/// Scans and resolves an offsets image in one step.
pub fn decode_markers(
    image: &RgbaImage,
    order: RowOrder,
    roles: HandRoles,
) -> Result<Option<ActionPoints>, MarkerError> {
    scan_markers(image, order).into_action_points(roles)
}

/// Blends two markers landing on the same pixel. Taking the maximum of each
/// channel keeps the result independent of painting order.
pub fn blend_markers(a: Rgba<u8>, b: Rgba<u8>) -> Rgba<u8> {
    Rgba([
        a[0].max(b[0]),
        a[1].max(b[1]),
        a[2].max(b[2]),
        a[3].max(b[3]),
    ])
}
