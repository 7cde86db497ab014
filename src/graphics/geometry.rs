//! Integer geometry used by the sheet pipeline
//!
//! Two rectangle types are kept apart on purpose: [`TLRectangle`] follows raster
//! storage (y grows downwards) and [`Rectangle`] follows the engine's display
//! convention (y grows upwards). Converting between them always needs the height
//! of the containing image.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Integer 2D vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Switches between top-left and bottom-left vertical conventions
    pub fn negate_y(self) -> Self {
        Self::new(self.x, -self.y)
    }

    /// Horizontal mirror around the half-pixel boundary at `x = -0.5`,
    /// so a point in a 1-pixel wide image maps onto itself.
    pub fn mirrored(self) -> Self {
        Self::new(-self.x - 1, self.y)
    }

    /// Component-wise floor division by a vector
    pub fn floor_div(self, other: Offset) -> Self {
        Self::new(floor_div(self.x, other.x), floor_div(self.y, other.y))
    }
}

impl From<(i32, i32)> for Offset {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Offset {
    type Output = Offset;

    fn sub(self, rhs: Offset) -> Offset {
        Offset::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Offset {
    type Output = Offset;

    fn neg(self) -> Offset {
        Offset::new(-self.x, -self.y)
    }
}

impl Mul<i32> for Offset {
    type Output = Offset;

    fn mul(self, rhs: i32) -> Offset {
        Offset::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul for Offset {
    type Output = Offset;

    fn mul(self, rhs: Offset) -> Offset {
        Offset::new(self.x * rhs.x, self.y * rhs.y)
    }
}

/// Floor division, rounding towards negative infinity
impl Div<i32> for Offset {
    type Output = Offset;

    fn div(self, rhs: i32) -> Offset {
        Offset::new(floor_div(self.x, rhs), floor_div(self.y, rhs))
    }
}

/// Integer division rounding towards negative infinity
pub fn floor_div(a: i32, b: i32) -> i32 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Rectangle with a bottom-left origin; `y` is the bottom edge and grows upwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y
    }

    pub fn top(&self) -> i32 {
        self.y + self.height
    }

    /// Mirrors the rectangle inside an image `image_width` pixels wide.
    pub fn flipped_within(&self, image_width: i32) -> Self {
        Self::new(image_width - self.right(), self.y, self.width, self.height)
    }

    /// Converts into raster coordinates of an image `image_height` pixels tall.
    pub fn to_top_left(&self, image_height: i32) -> TLRectangle {
        TLRectangle::new(self.x, image_height - self.top(), self.width, self.height)
    }
}

/// Rectangle with a top-left origin; `y` is the top edge and grows downwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TLRectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TLRectangle {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from exclusive `(left, top, right, bottom)` bounds.
    pub fn from_bounds((left, top, right, bottom): (i32, i32, i32, i32)) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.left(), self.top(), self.right(), self.bottom())
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Offset {
        Offset::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn translate(&self, offset: Offset) -> Self {
        Self::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    /// Mirrors the rectangle around `x = 0`. Used for boxes stored relative to a
    /// cell centre.
    pub fn flipped(&self) -> Self {
        Self::new(-self.right(), self.y, self.width, self.height)
    }

    /// Converts into display coordinates of an image `image_height` pixels tall.
    pub fn to_bottom_left(&self, image_height: i32) -> Rectangle {
        Rectangle::new(self.x, image_height - self.bottom(), self.width, self.height)
    }
}

impl Add<Offset> for TLRectangle {
    type Output = TLRectangle;

    fn add(self, rhs: Offset) -> TLRectangle {
        self.translate(rhs)
    }
}

/// Smallest rectangle centred on the origin that still contains `rect`.
///
/// Canvases are sized from this so that content placed around a cell centre
/// never clips on either side.
pub fn center_bounds(rect: &TLRectangle) -> TLRectangle {
    let half_width = rect.left().abs().max(rect.right().abs());
    let half_height = rect.top().abs().max(rect.bottom().abs());
    TLRectangle::new(-half_width, -half_height, half_width * 2, half_height * 2)
}

/// Top-left position of `rect` once centred in a `cell_width` x `cell_height` cell
/// and shifted by `offset`.
///
/// Flipped frames round their half width up instead of down. Import adds one
/// pixel to the sprite offset of flipped odd-width frames, and the two cancel.
pub fn place_in_cell(
    cell_width: u32,
    cell_height: u32,
    rect: &Rectangle,
    flipped: bool,
    offset: Offset,
) -> Offset {
    let rect_center_x = if flipped {
        (rect.width + 1) / 2
    } else {
        rect.width / 2
    };
    let rect_center_y = rect.height / 2;
    Offset::new(
        cell_width as i32 / 2 - rect_center_x + offset.x,
        cell_height as i32 / 2 - rect_center_y + offset.y,
    )
}

/// Rounds `n` up to the next multiple of `quantum`. Zero rounds up to one quantum
/// so that a canvas is never empty. `quantum` must be non-zero.
pub fn round_up_to_multiple(n: u32, quantum: u32) -> u32 {
    if n == 0 {
        quantum
    } else {
        n.div_ceil(quantum) * quantum
    }
}
